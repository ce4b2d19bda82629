// Raw shapes of the flight-offers search response, exactly as the provider
// sends them. Fields the provider may omit are optional here; turning these
// into the validated domain model is the job of the `offers` module.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SearchResponseBody {
    #[serde(default)]
    pub data: Vec<RawOffer>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawOffer {
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub itineraries: Vec<RawItinerary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawPrice {
    pub total: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawItinerary {
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegment {
    pub carrier_code: Option<String>,
    pub number: Option<String>,
    pub departure: Option<RawSegmentPoint>,
    pub arrival: Option<RawSegmentPoint>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegmentPoint {
    pub iata_code: Option<String>,
    pub at: Option<String>,
}
