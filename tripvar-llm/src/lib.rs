mod generation;
pub mod openai_compatible;
pub mod stream;
mod transport;

pub use generation::TextGenerationService;
pub use openai_compatible::{ChatCompletionRequest, CompletionRequest};
pub use stream::{
    assemble_events, consume, decode_fragment, fragment_lines, AssembledText, AssemblerState,
    FragmentDecode, StreamAssembler, StreamDelta, StreamEnd,
};
pub use transport::{FragmentStream, HttpTransport, OutboundRequest, Transport, TransportResponse};
pub use tripvar_core::{GenerationRequest, GenerationResult, UsageSource};
