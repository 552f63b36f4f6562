pub mod control_form_builder;
pub mod error;
pub mod scoring;
pub mod select;

pub use control_form_builder::{build_form, MountedTools};
pub use error::PlannerError;
pub use scoring::{score, ScoreInputs, Weights};
pub use select::{select_within_leniency, LineOffer, DEFAULT_LENIENCY};

use model::{ControlForm, LineId, Location, Piece, WarehouseId};

/// One line's candidacy for a piece's next step: the form it would run
/// and the line's current conveyor occupancy, already folded into the
/// form's score.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub line: LineId,
    pub form: ControlForm,
    pub score: f64,
}

/// Full C3 planning pass for one piece: build a form against every
/// candidate line, score them, and select which lines the piece's waiter
/// should register on. `candidates` is the set of lines currently ready
/// to accept a new piece, each with its mounted tools and queue depth.
///
/// Pieces originating at a warehouse bypass line selection and register
/// only on `L0`, per policy.
pub fn plan(
    piece: &Piece,
    tx_id: model::TxId,
    candidates: &[(LineId, MountedTools, usize)],
    weights: Weights,
    leniency: f64,
) -> Result<Vec<Candidate>, PlannerError> {
    if matches!(piece.location, Location::Warehouse(WarehouseId::W2)) {
        let form = control_form_builder::build_form(
            LineId::L0,
            tx_id,
            piece,
            MountedTools::default(),
            0,
            weights,
        )
        .expect("L0 always accepts any piece");
        return Ok(vec![Candidate { line: LineId::L0, form, score: 0.0 }]);
    }

    let offers: Vec<Candidate> = candidates
        .iter()
        .filter_map(|(line, mounted, queue_size)| {
            control_form_builder::build_form(*line, tx_id, piece, *mounted, *queue_size, weights)
                .map(|form| {
                    let score = scoring::score(
                        weights,
                        ScoreInputs {
                            intrinsic_time_secs: form.intrinsic_time_secs,
                            queue_size: *queue_size as u32,
                            total_steps: piece.steps.len() as u32,
                            steps_completed: (piece.current_step + form.steps_covered) as u32,
                        },
                    );
                    Candidate { line: *line, form, score }
                })
        })
        .collect();

    if offers.is_empty() {
        return Err(PlannerError::NoLineOffered { candidates: candidates.len() });
    }

    let line_offers: Vec<LineOffer> = offers.iter().map(|c| LineOffer { line: c.line, score: c.score }).collect();
    let selected = select_within_leniency(&line_offers, leniency);

    Ok(offers.into_iter().filter(|c| selected.contains(&c.line)).collect())
}
