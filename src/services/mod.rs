pub mod aggregation;
pub mod file_accessor;
pub mod keyword_filter;
pub mod result_assembler;
pub mod retrieval;
pub mod reverse_scanner;

pub use aggregation::{fan_out, AggregateResponse, LocalInstance, RetrievalInstance};
pub use file_accessor::{AccessLimits, ByteSource, FileAccessor, InMemorySource};
pub use keyword_filter::KeywordFilter;
pub use result_assembler::{
    collect_bulk, stream_to_sink, ChannelSink, EntrySink, SinkControl, WriterSink,
};
pub use retrieval::{LogRetriever, StreamHandle};
pub use reverse_scanner::{ReverseScanner, DEFAULT_WINDOW_SIZE};
