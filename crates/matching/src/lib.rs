//! Three-way invoice/PO/receipt matching: candidate selection, confidence
//! scoring, decision policy, and the append-only audit trail behind every
//! automated or reviewed matching decision.

mod audit;
mod batch;
mod candidates;
mod engine;
mod match_result;
mod repository;
mod scoring;
mod similarity;
mod three_way;

pub use audit::{build_event, verify_chain, Actor, MatchAuditEvent};
pub use batch::{run_batch, BatchConfig, BatchStats, InvoiceOutcome};
pub use candidates::{select_candidates, Candidate};
pub use engine::{run_match, ExceptionReason, MatchRun};
pub use match_result::{ComponentScores, Discrepancy, MatchResult, MatchResultStatus, MatchType, ThreeWayType, ALGORITHM_VERSION};
pub use repository::MatchingRepository;
pub use scoring::{composite_score, score_amount, score_date, score_lines, score_reference, score_vendor, MatchedLinePair};
pub use similarity::{jaro_winkler, levenshtein_ratio, normalize_for_matching, normalize_reference, ocr_corrected_ratio};
pub use three_way::classify as classify_three_way;
