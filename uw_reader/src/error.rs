use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Block count of zero, or directory entries pointing past the end of the stream.
	#[error("malformed header: {0}")]
	MalformedHeader(String),
	
	/// A read or seek ran past the available bytes.
	#[error("truncated stream while reading {context}")]
	TruncatedStream { context: &'static str },
	
	/// A level block that does not hold exactly one tile map and object table.
	#[error("malformed level block {index}: {len} bytes, expected {expected}")]
	MalformedBlock { index: usize, len: usize, expected: usize },
	
	#[error(transparent)]
	Io(io::Error),
}

impl Error {
	/// Errors confined to a single block, which lenient decoding may skip past.
	pub fn is_block_local(&self) -> bool {
		matches!(self, Error::TruncatedStream { .. } | Error::MalformedBlock { .. })
	}
}

impl From<io::Error> for Error {
	fn from(err: io::Error) -> Self {
		match err.kind() {
			io::ErrorKind::UnexpectedEof => Error::TruncatedStream { context: "stream" },
			_ => Error::Io(err),
		}
	}
}

pub(crate) trait Context<T> {
	/// Names the structure being read when the stream ends early.
	fn context(self, context: &'static str) -> Result<T>;
}

impl<T> Context<T> for io::Result<T> {
	fn context(self, context: &'static str) -> Result<T> {
		self.map_err(|err| match err.kind() {
			io::ErrorKind::UnexpectedEof => Error::TruncatedStream { context },
			_ => Error::Io(err),
		})
	}
}

pub type Result<T> = std::result::Result<T, Error>;
