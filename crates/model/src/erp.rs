use crate::piece::Transformation;
use serde::{Deserialize, Serialize};

/// `GET /materials/expected?day=N` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedMaterial {
    pub material_type: String,
    pub shipment_id: String,
    pub quantity: u32,
}

/// `GET /production?max_n_items=N` entry: a piece's full recipe, not yet
/// assigned a control id. The wire format carries only `steps` — initial
/// identifier, kind, and location are derived from the first step by the
/// intake loop, not carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceRecipe {
    pub steps: Vec<Transformation>,
}

/// `POST /transformations` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationPost {
    pub transf_id: String,
    pub material_id: String,
    pub product_id: String,
    pub line_id: String,
    pub machine_id: String,
    /// Step duration plus the 30s tool-change penalty when one was needed.
    pub time_taken: u32,
}

/// `GET /deliveries` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: String,
    pub piece: String,
    pub quantity: u32,
}

/// `POST /deliveries/statistics` body: one post per delivery line used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatistics {
    pub line: String,
    pub piece: String,
    pub associated_order_id: String,
    pub quantity: u32,
}
