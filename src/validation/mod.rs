pub mod preflight;

pub use preflight::{PreflightCheck, PreflightChecker, PreflightReport};
