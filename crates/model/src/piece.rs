use crate::{ControlId, LineId, WarehouseId, line::Tool};
use serde::{Deserialize, Serialize};

/// One immutable recipe step: a material+tool input that yields a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub material_id: String,
    pub material_kind: String,
    pub product_id: String,
    pub product_kind: String,
    pub tool: Tool,
    pub duration_secs: u32,
    /// The ERP's own id for this transformation, echoed back on the post.
    pub erp_transf_id: String,
}

/// Where a piece currently sits: a warehouse, or a line it's traversing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Warehouse(WarehouseId),
    Line(LineId),
}

impl Location {
    pub fn warehouse(w: WarehouseId) -> Self {
        Location::Warehouse(w)
    }

    pub fn line(l: LineId) -> Self {
        Location::Line(l)
    }
}

/// An ERP-assigned product being manufactured. `external_id`/`kind` mutate
/// after each transformation to the completed step's product id/kind; see
/// the "Transformation identity mutation" design note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub external_id: String,
    pub kind: String,
    pub location: Location,
    pub steps: Vec<Transformation>,
    pub current_step: usize,
    pub control_id: ControlId,
}

impl Piece {
    /// New pieces are pulled from production and live in `W1` until a
    /// line claims them, matching the reference intake's `Location =
    /// ID_W1` assignment. A `W2`-origin piece (the L0 fast lane) is built
    /// by overwriting `location` after construction.
    pub fn new(external_id: String, kind: String, steps: Vec<Transformation>) -> Self {
        assert!(!steps.is_empty(), "a piece's recipe must have at least one step");
        Self {
            external_id,
            kind,
            location: Location::Warehouse(WarehouseId::W1),
            steps,
            current_step: 0,
            control_id: ControlId(0),
        }
    }

    pub fn current_transformation(&self) -> &Transformation {
        &self.steps[self.current_step]
    }

    pub fn is_complete(&self) -> bool {
        self.current_step == self.steps.len()
    }

    pub fn remaining_steps(&self) -> usize {
        self.steps.len() - self.current_step
    }

    /// `Wx → Ly`, only legal transition into a line.
    pub fn exit_to_prod_line(&mut self, line: LineId) {
        assert!(
            matches!(self.location, Location::Warehouse(_)),
            "exit_to_prod_line from non-warehouse location"
        );
        self.location = Location::Line(line);
    }

    /// `Ly → Wz`, only legal transition out of a line. Also mutates
    /// identity/kind to the completed step's product and advances the
    /// cursor, matching the reference's per-step mutation semantics.
    pub fn enter_warehouse(&mut self, warehouse: WarehouseId) {
        assert!(
            matches!(self.location, Location::Line(_)),
            "enter_warehouse from non-line location"
        );
        self.location = Location::Warehouse(warehouse);
    }

    pub fn transform(&mut self) {
        let step = &self.steps[self.current_step];
        self.external_id = step.product_id.clone();
        self.kind = step.product_kind.clone();
        self.current_step += 1;
    }

    /// Asserts the completion invariant from the component design: a piece
    /// that has exited the system must be at `W2`, fully stepped, and
    /// carrying the last step's product identity.
    pub fn validate_completion(&self) -> Result<(), String> {
        let last = self.steps.last().expect("non-empty recipe");
        if self.location != Location::Warehouse(WarehouseId::W2) {
            return Err(format!("completed piece not at W2: {:?}", self.location));
        }
        if self.current_step != self.steps.len() {
            return Err(format!(
                "completed piece has unfinished steps: {}/{}",
                self.current_step,
                self.steps.len()
            ));
        }
        if self.external_id != last.product_id || self.kind != last.product_kind {
            return Err("completed piece identity does not match last step's product".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(tool: Tool, product: &str) -> Transformation {
        Transformation {
            material_id: "m".into(),
            material_kind: "M".into(),
            product_id: product.into(),
            product_kind: product.into(),
            tool,
            duration_secs: 10,
            erp_transf_id: "t1".into(),
        }
    }

    #[test]
    fn transform_mutates_identity_and_advances_cursor() {
        let mut piece = Piece::new("p0".into(), "P0".into(), vec![step(Tool::T1, "P1")]);
        piece.transform();
        assert_eq!(piece.external_id, "P1");
        assert_eq!(piece.kind, "P1");
        assert_eq!(piece.current_step, 1);
        assert!(piece.is_complete());
    }

    #[test]
    fn validate_completion_requires_w2_and_full_cursor() {
        let mut piece = Piece::new("p0".into(), "P0".into(), vec![step(Tool::T1, "P1")]);
        piece.exit_to_prod_line(LineId(1));
        piece.transform();
        assert!(piece.validate_completion().is_err());
        piece.enter_warehouse(WarehouseId::W2);
        assert!(piece.validate_completion().is_ok());
    }
}
