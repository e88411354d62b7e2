pub mod alignment;
pub mod alignment_list;
pub mod cancel;
pub mod error;
pub mod format;
pub mod io;
pub mod partition;
pub mod seqcode;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod writer;
