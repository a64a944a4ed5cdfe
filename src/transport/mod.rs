//! Transport module - exact-length byte I/O and stream bindings.
//!
//! - [`Transport`]: send-all / receive-exactly-N over any duplex stream
//! - [`TcpAcceptor`] / [`connect_tcp`]: TCP binding
//! - [`PipeListener`] / [`connect_pipe`]: Unix Domain Socket (Linux/macOS)
//!   or Named Pipe (Windows) binding

mod acceptor;
mod pipe;
mod session;

pub use acceptor::{connect_tcp, Acceptor, AnyAcceptor, BoxedStream, DuplexStream, TcpAcceptor};
pub use pipe::{connect_pipe, generate_pipe_path, PipeListener, PipeStream};
pub use session::Transport;
