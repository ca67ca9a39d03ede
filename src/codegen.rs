mod codegen;
mod operand;
mod runtime;

pub use codegen::*;
pub use operand::*;
pub use runtime::*;
