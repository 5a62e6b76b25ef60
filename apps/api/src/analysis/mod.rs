// Job description analysis: keyword extraction and structured field extraction.
// Pure text processing, no I/O; handlers are the only async entry point.

pub mod handlers;
pub mod jd_analyzer;
pub mod keywords;
pub mod sections;
pub mod terms;
