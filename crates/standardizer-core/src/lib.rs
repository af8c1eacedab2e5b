//! Spreadsheet Standardizer Core
//!
//! The deterministic half of the standardizer: a language model proposes a
//! column-mapping plan, and this crate decides what that plan actually does.
//!
//! - [`table`]: column-oriented table model with schema lookups
//! - [`plan`]: the plan document and its fixed operation vocabulary
//! - [`executor`]: interprets a plan against the raw and ideal tables
//! - [`judge`]: decides whether a run populated anything new
//! - [`fallback`]: hard-coded rules for the ACS raw export
//! - [`workbook`]: xlsx reading and writing
//!
//! ## Example
//!
//! ```ignore
//! use standardizer_core::{execute_plan, improved, apply_fallback, Plan};
//!
//! let plan = Plan::from_json(&plan_text)?;
//! let mut run = execute_plan(&plan, &raw, &ideal);
//! if !improved(&ideal, &run.table) {
//!     run = apply_fallback(&raw, &ideal);
//! }
//! ```

pub mod error;
pub mod executor;
pub mod fallback;
pub mod judge;
pub mod plan;
pub mod table;
pub mod transforms;
pub mod workbook;

pub use error::{CoreError, CoreResult};
pub use executor::{execute_plan, Execution};
pub use fallback::{apply_fallback, ACS_RULES};
pub use judge::improved;
pub use plan::{Operation, Plan, PlanEntry};
pub use table::{CellValue, ColumnId, Table};
pub use workbook::{read_workbook, write_workbook};
