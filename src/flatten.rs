// Itinerary flattening
// Turns nested offer records into one flat, sortable row per itinerary (or
// per segment), applying the stop-count filter and deriving connection and
// layover fields along the way. Pure and deterministic: identical input
// yields identical output, and nothing here touches shared state or I/O.

use crate::duration::{self, DurationDisplay, ParseError};
use crate::offers::{Itinerary, Offer, Segment};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlattenError {
    #[error("duration parse failed for offer {offer}: {source}")]
    DurationParse {
        offer: usize,
        #[source]
        source: ParseError,
    },
}

// Logically inconsistent but structurally valid data. Never fatal: warnings
// are collected in the report for the caller to log or display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataConsistencyWarning {
    #[error("offer {offer}: connection at {connection} departs {deficit} before the inbound leg arrives")]
    NegativeLayover {
        offer: usize,
        itinerary: usize,
        connection: String,
        arrival: NaiveDateTime,
        departure: NaiveDateTime,
        deficit: DurationDisplay,
    },

    #[error("offer {offer}: flight {flight} arrives {deficit} before it departs")]
    ArrivalBeforeDeparture {
        offer: usize,
        itinerary: usize,
        flight: String,
        deficit: DurationDisplay,
    },
}

// One row per emitted itinerary by default; per-segment granularity instead
// emits one row per flown leg with empty connection fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowGranularity {
    PerItinerary,
    PerSegment,
}

// What a negative layover does to its row. A warning is recorded in every
// case; the policy only decides the rendering and whether the row survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeLayoverPolicy {
    // Render the gap as "00:00"
    Clamp,
    // Render the signed gap ("-02:30")
    Warn,
    // Drop the itinerary's row
    Reject,
}

// What a malformed duration string does to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorPolicy {
    SkipRow,
    Abort,
}

#[derive(Debug, Clone)]
pub struct FlattenConfig {
    pub granularity: RowGranularity,
    pub on_negative_layover: NegativeLayoverPolicy,
    pub on_parse_error: ParseErrorPolicy,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            granularity: RowGranularity::PerItinerary,
            on_negative_layover: NegativeLayoverPolicy::Warn,
            on_parse_error: ParseErrorPolicy::SkipRow,
        }
    }
}

// One flattened row, fields in presentation order. The joined fields use
// ", " between entries and stay empty for non-stop itineraries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightRow {
    pub index: usize,
    pub price: f64,
    pub airlines: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub duration: DurationDisplay,
    pub connecting_cities: String,
    pub layovers: String,
}

// Skip accounting. Every offer and row that does not make it into the output
// is counted somewhere in here; nothing is dropped without a trace.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FlattenStats {
    pub offers_seen: usize,
    // excluded by the stop-count filter
    pub offers_filtered: usize,
    // structurally unusable (no itineraries, an empty segment list)
    pub offers_skipped: usize,
    pub rows_emitted: usize,
    // dropped per the parse-error or negative-layover policy
    pub rows_skipped: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FlattenReport {
    pub rows: Vec<FlightRow>,
    pub stats: FlattenStats,
    pub warnings: Vec<DataConsistencyWarning>,
}

pub struct OfferFlattener {
    config: FlattenConfig,
}

impl Default for OfferFlattener {
    fn default() -> Self {
        Self::new(FlattenConfig::default())
    }
}

impl OfferFlattener {
    pub fn new(config: FlattenConfig) -> Self {
        Self { config }
    }

    // Flatten offers in input order. Offer and itinerary order is preserved;
    // sorting is the caller's job (see presentation_order). The stop-count
    // filter reads the FIRST itinerary only, so a round trip with an
    // asymmetric return leg is kept or dropped as a whole on the outbound
    // count. Deliberate; covered by tests so a change shows up.
    pub fn flatten(
        &self,
        offers: &[Offer],
        max_stops: usize,
    ) -> Result<FlattenReport, FlattenError> {
        let mut report = FlattenReport::default();
        let mut index = 1;

        for (offer_idx, offer) in offers.iter().enumerate() {
            report.stats.offers_seen += 1;

            let Some(first_itinerary) = offer.itineraries.first() else {
                warn!(offer = offer_idx, "skipping offer with no itineraries");
                report.stats.offers_skipped += 1;
                continue;
            };
            if offer.itineraries.iter().any(|it| it.segments.is_empty()) {
                warn!(offer = offer_idx, "skipping offer with an empty segment list");
                report.stats.offers_skipped += 1;
                continue;
            }

            let stopovers = first_itinerary.segments.len() - 1;
            if stopovers > max_stops {
                report.stats.offers_filtered += 1;
                continue;
            }

            for (itin_idx, itinerary) in offer.itineraries.iter().enumerate() {
                match self.config.granularity {
                    RowGranularity::PerItinerary => {
                        if let Some(row) = self.itinerary_row(
                            offer,
                            offer_idx,
                            itin_idx,
                            itinerary,
                            index,
                            &mut report,
                        )? {
                            report.rows.push(row);
                            report.stats.rows_emitted += 1;
                            index += 1;
                        }
                    }
                    RowGranularity::PerSegment => {
                        for segment in &itinerary.segments {
                            if let Some(row) = self.segment_row(
                                offer,
                                offer_idx,
                                itin_idx,
                                segment,
                                index,
                                &mut report,
                            ) {
                                report.rows.push(row);
                                report.stats.rows_emitted += 1;
                                index += 1;
                            }
                        }
                    }
                }
            }
        }

        debug!(
            rows = report.stats.rows_emitted,
            filtered = report.stats.offers_filtered,
            skipped = report.stats.offers_skipped,
            warnings = report.warnings.len(),
            "flatten complete"
        );
        Ok(report)
    }

    fn itinerary_row(
        &self,
        offer: &Offer,
        offer_idx: usize,
        itin_idx: usize,
        itinerary: &Itinerary,
        index: usize,
        report: &mut FlattenReport,
    ) -> Result<Option<FlightRow>, FlattenError> {
        let total_duration = match duration::parse_duration(&itinerary.duration) {
            Ok(parsed) => parsed,
            Err(err) => match self.config.on_parse_error {
                ParseErrorPolicy::SkipRow => {
                    warn!(offer = offer_idx, error = %err, "skipping row with malformed duration");
                    report.stats.rows_skipped += 1;
                    return Ok(None);
                }
                ParseErrorPolicy::Abort => {
                    return Err(FlattenError::DurationParse {
                        offer: offer_idx,
                        source: err,
                    })
                }
            },
        };

        let mut airlines = Vec::with_capacity(itinerary.segments.len());
        let mut connecting_cities = Vec::new();
        let mut layovers = Vec::new();

        for (leg, segment) in itinerary.segments.iter().enumerate() {
            airlines.push(format!("{} {}", segment.carrier_code, segment.flight_number));

            if leg > 0 {
                let previous = &itinerary.segments[leg - 1];
                match duration::layover_duration(previous.arrival.at, segment.departure.at) {
                    Ok(gap) => layovers.push(gap.to_string()),
                    Err(negative) => {
                        report.warnings.push(DataConsistencyWarning::NegativeLayover {
                            offer: offer_idx,
                            itinerary: itin_idx,
                            connection: segment.departure.iata_code.clone(),
                            arrival: negative.arrival,
                            departure: negative.departure,
                            deficit: negative.deficit,
                        });
                        match self.config.on_negative_layover {
                            NegativeLayoverPolicy::Clamp => {
                                layovers.push(DurationDisplay::new(0, 0).to_string())
                            }
                            NegativeLayoverPolicy::Warn => {
                                layovers.push(format!("-{}", negative.deficit))
                            }
                            NegativeLayoverPolicy::Reject => {
                                report.stats.rows_skipped += 1;
                                return Ok(None);
                            }
                        }
                    }
                }
                connecting_cities.push(segment.departure.iata_code.clone());
            }
        }

        // Segment lists were checked non-empty before the filter ran
        let (Some(first), Some(last)) = (itinerary.segments.first(), itinerary.segments.last())
        else {
            return Ok(None);
        };

        Ok(Some(FlightRow {
            index,
            price: offer.price.amount,
            airlines: airlines.join(", "),
            origin: first.departure.iata_code.clone(),
            destination: last.arrival.iata_code.clone(),
            departure_time: first.departure.at,
            arrival_time: last.arrival.at,
            duration: total_duration,
            connecting_cities: connecting_cities.join(", "),
            layovers: layovers.join(", "),
        }))
    }

    // Per-segment rows carry the leg's own wall-clock duration and no
    // connection fields; the negative-layover policy governs a leg that
    // claims to arrive before it departs.
    fn segment_row(
        &self,
        offer: &Offer,
        offer_idx: usize,
        itin_idx: usize,
        segment: &Segment,
        index: usize,
        report: &mut FlattenReport,
    ) -> Option<FlightRow> {
        let label = format!("{} {}", segment.carrier_code, segment.flight_number);
        let duration = match duration::layover_duration(segment.departure.at, segment.arrival.at) {
            Ok(span) => span,
            Err(negative) => {
                report
                    .warnings
                    .push(DataConsistencyWarning::ArrivalBeforeDeparture {
                        offer: offer_idx,
                        itinerary: itin_idx,
                        flight: label.clone(),
                        deficit: negative.deficit,
                    });
                match self.config.on_negative_layover {
                    NegativeLayoverPolicy::Clamp => DurationDisplay::new(0, 0),
                    NegativeLayoverPolicy::Warn => negative.deficit,
                    NegativeLayoverPolicy::Reject => {
                        report.stats.rows_skipped += 1;
                        return None;
                    }
                }
            }
        };

        Some(FlightRow {
            index,
            price: offer.price.amount,
            airlines: label,
            origin: segment.departure.iata_code.clone(),
            destination: segment.arrival.iata_code.clone(),
            departure_time: segment.departure.at,
            arrival_time: segment.arrival.at,
            duration,
            connecting_cities: String::new(),
            layovers: String::new(),
        })
    }
}

// The documented default presentation order: price ascending, then total
// duration ascending. The flattener itself never sorts; callers apply this
// (or their own order) to the emitted rows.
pub fn presentation_order(a: &FlightRow, b: &FlightRow) -> Ordering {
    a.price
        .partial_cmp(&b.price)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.duration.total_minutes().cmp(&b.duration.total_minutes()))
}
