// Typed offer model. The wire shapes from `wire` are validated exactly once
// here; past this boundary every field is present and well-typed, so the
// flattening walk never has to reach into loosely-structured data.

use crate::wire;
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

// Error types for boundary validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedOfferError {
    #[error("offer has no itineraries")]
    NoItineraries,

    #[error("itinerary has no segments")]
    NoSegments,

    #[error("offer is missing its price")]
    MissingPrice,

    #[error("unparseable price amount '{0}'")]
    InvalidPrice(String),

    #[error("itinerary is missing its duration")]
    MissingDuration,

    #[error("segment is missing its {0}")]
    MissingSegmentField(&'static str),

    #[error("unparseable timestamp '{0}'")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPoint {
    pub iata_code: String,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub carrier_code: String,
    pub flight_number: String,
    pub departure: SegmentPoint,
    pub arrival: SegmentPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    // Raw ISO-8601 total duration; parsed during flattening so the caller's
    // parse-error policy can decide what a bad value does to the row.
    pub duration: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub price: Price,
    pub itineraries: Vec<Itinerary>,
}

impl TryFrom<wire::RawSegmentPoint> for SegmentPoint {
    type Error = MalformedOfferError;

    fn try_from(raw: wire::RawSegmentPoint) -> Result<Self, Self::Error> {
        let iata_code = raw
            .iata_code
            .ok_or(MalformedOfferError::MissingSegmentField("airport code"))?;
        let at = raw
            .at
            .ok_or(MalformedOfferError::MissingSegmentField("timestamp"))?;
        let at = at
            .parse::<NaiveDateTime>()
            .map_err(|_| MalformedOfferError::InvalidTimestamp(at))?;
        Ok(Self { iata_code, at })
    }
}

impl TryFrom<wire::RawSegment> for Segment {
    type Error = MalformedOfferError;

    fn try_from(raw: wire::RawSegment) -> Result<Self, Self::Error> {
        Ok(Self {
            carrier_code: raw
                .carrier_code
                .ok_or(MalformedOfferError::MissingSegmentField("carrier code"))?,
            flight_number: raw
                .number
                .ok_or(MalformedOfferError::MissingSegmentField("flight number"))?,
            departure: raw
                .departure
                .ok_or(MalformedOfferError::MissingSegmentField("departure"))?
                .try_into()?,
            arrival: raw
                .arrival
                .ok_or(MalformedOfferError::MissingSegmentField("arrival"))?
                .try_into()?,
        })
    }
}

impl TryFrom<wire::RawItinerary> for Itinerary {
    type Error = MalformedOfferError;

    fn try_from(raw: wire::RawItinerary) -> Result<Self, Self::Error> {
        if raw.segments.is_empty() {
            return Err(MalformedOfferError::NoSegments);
        }
        Ok(Self {
            duration: raw.duration.ok_or(MalformedOfferError::MissingDuration)?,
            segments: raw
                .segments
                .into_iter()
                .map(Segment::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

impl TryFrom<wire::RawOffer> for Offer {
    type Error = MalformedOfferError;

    fn try_from(raw: wire::RawOffer) -> Result<Self, Self::Error> {
        if raw.itineraries.is_empty() {
            return Err(MalformedOfferError::NoItineraries);
        }
        let price = raw.price.ok_or(MalformedOfferError::MissingPrice)?;
        let total = price.total.ok_or(MalformedOfferError::MissingPrice)?;
        let amount = total
            .parse::<f64>()
            .map_err(|_| MalformedOfferError::InvalidPrice(total))?;
        Ok(Self {
            price: Price {
                amount,
                currency: price.currency.ok_or(MalformedOfferError::MissingPrice)?,
            },
            itineraries: raw
                .itineraries
                .into_iter()
                .map(Itinerary::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

// Validate a decoded batch. Offers that fail validation are logged and
// counted, never dropped silently; the rest pass through in input order.
pub fn validate_offers(raw: Vec<wire::RawOffer>) -> (Vec<Offer>, usize) {
    let mut offers = Vec::with_capacity(raw.len());
    let mut rejected = 0;
    for (position, raw_offer) in raw.into_iter().enumerate() {
        match Offer::try_from(raw_offer) {
            Ok(offer) => offers.push(offer),
            Err(err) => {
                warn!(position, error = %err, "rejecting malformed offer");
                rejected += 1;
            }
        }
    }
    (offers, rejected)
}

// A small sample for inline testing
pub const SMALL_SAMPLE_JSON: &str = r#"
{
  "data": [
    {
      "price": { "total": "312.40", "currency": "USD" },
      "itineraries": [
        {
          "duration": "PT7H25M",
          "segments": [
            {
              "carrierCode": "UA",
              "number": "512",
              "departure": { "iataCode": "LAX", "at": "2025-09-01T08:05:00" },
              "arrival": { "iataCode": "DEN", "at": "2025-09-01T11:30:00" }
            },
            {
              "carrierCode": "UA",
              "number": "2210",
              "departure": { "iataCode": "DEN", "at": "2025-09-01T13:00:00" },
              "arrival": { "iataCode": "JFK", "at": "2025-09-01T18:30:00" }
            }
          ]
        }
      ]
    }
  ]
}
"#;
