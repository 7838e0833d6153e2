pub mod events;
pub mod filename;
pub mod process;
pub mod queue;
pub mod url_parser;
pub mod ytdlp;
