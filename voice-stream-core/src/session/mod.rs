pub mod stream_session;
