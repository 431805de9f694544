pub mod code_detector;
pub mod dedup_ledger;
pub mod error;
pub mod frame_source;
pub mod record_parser;
pub mod replay;
pub mod scan_controller;
pub mod sink_client;
