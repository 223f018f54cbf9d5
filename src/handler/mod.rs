use std::error::Error;

use http::Request;

use crate::protocol::{OutboundResponse, ReceivedBody};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Request dispatch seam. The reactor invokes the handler exactly once per
/// request, after the body has been fully received.
pub trait Handler {
    fn call(&self, req: Request<ReceivedBody>) -> Result<OutboundResponse, BoxError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Err> Handler for HandlerFn<F>
where
    F: Fn(Request<ReceivedBody>) -> Result<OutboundResponse, Err>,
    Err: Into<BoxError>,
{
    fn call(&self, req: Request<ReceivedBody>) -> Result<OutboundResponse, BoxError> {
        (self.f)(req).map_err(Into::into)
    }
}

pub fn make_handler<F, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<ReceivedBody>) -> Result<OutboundResponse, Err>,
    Err: Into<BoxError>,
{
    HandlerFn { f }
}
