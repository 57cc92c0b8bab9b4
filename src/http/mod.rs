//! HTTP/1.1 wire layer.
//!
//! This module reads request heads, exposes request bodies as streams and
//! writes buffered responses back, reusing connections with keep-alive.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection state machine driving the pipeline
//! - **`parser`**: Parses request heads from byte buffers
//! - **`body`**: Streaming, length-framed request bodies
//! - **`request`**: Request head representation and methods
//! - **`response`**: Status codes and responses with a builder
//! - **`writer`**: Serializes and writes responses to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for a request head
//!        └──────┬──────┘
//!               │ Head parsed (bad heads skip to Writing with 400/431/501)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Run the pipeline, drain the body
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod body;
pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
