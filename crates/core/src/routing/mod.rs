//! Classifies inbound message parts and turns them into an instruction.

pub mod inbound;
pub mod router;

pub use inbound::{ActionEvent, InboundPart, Scalar};
pub use router::{RoutedInstruction, build_instruction};
