mod build_events;
#[cfg(unix)]
mod pipe_session;
