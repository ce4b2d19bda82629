use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flight_search::flatten::OfferFlattener;
use flight_search::offers::{Itinerary, Offer, Price, Segment, SegmentPoint};
use rand::{thread_rng, Rng};

fn point(code: &str, at: &str) -> SegmentPoint {
    SegmentPoint {
        iata_code: code.to_string(),
        at: at.parse().expect("timestamp"),
    }
}

// Build a mixed batch: roughly half non-stop, half one-stop offers
fn generate_offers(count: usize) -> Vec<Offer> {
    let mut rng = thread_rng();
    (0..count)
        .map(|i| {
            let price = Price {
                amount: rng.gen_range(80.0..1200.0),
                currency: "USD".to_string(),
            };
            let segments = if i % 2 == 0 {
                vec![Segment {
                    carrier_code: "DL".to_string(),
                    flight_number: format!("{}", 100 + i % 900),
                    departure: point("LAX", "2025-09-01T08:00:00"),
                    arrival: point("JFK", "2025-09-01T16:25:00"),
                }]
            } else {
                vec![
                    Segment {
                        carrier_code: "UA".to_string(),
                        flight_number: format!("{}", 100 + i % 900),
                        departure: point("LAX", "2025-09-01T08:05:00"),
                        arrival: point("DEN", "2025-09-01T11:30:00"),
                    },
                    Segment {
                        carrier_code: "UA".to_string(),
                        flight_number: format!("{}", 2000 + i % 900),
                        departure: point("DEN", "2025-09-01T13:00:00"),
                        arrival: point("JFK", "2025-09-01T18:30:00"),
                    },
                ]
            };
            Offer {
                price,
                itineraries: vec![Itinerary {
                    duration: if i % 2 == 0 {
                        "PT5H25M".to_string()
                    } else {
                        "PT7H25M".to_string()
                    },
                    segments,
                }],
            }
        })
        .collect()
}

pub fn flatten_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("itinerary_flattening");

    for count in [100, 1_000, 10_000].iter() {
        let offers = generate_offers(*count);
        let flattener = OfferFlattener::default();

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let report = flattener
                    .flatten(black_box(&offers), black_box(1))
                    .expect("flatten");
                black_box(report.rows.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, flatten_benchmark);
criterion_main!(benches);
