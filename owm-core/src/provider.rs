use std::fmt::{self, Debug};

use serde_json::Value;

use crate::error::OwmError;

pub mod openweather;

pub use openweather::HttpTransport;

/// The two One Call endpoints the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Current conditions plus hourly and daily forecast.
    OneCall,
    /// A past date, selected by the `dt` query parameter.
    TimeMachine,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::OneCall => "onecall",
            Endpoint::TimeMachine => "onecall/timemachine",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Blocking access to the upstream provider.
///
/// Implementations return the decoded JSON body for a 200 response,
/// [`OwmError::Authentication`] for a 401, [`OwmError::Provider`] for any
/// other status and [`OwmError::UpstreamUnavailable`] when the request
/// never completes.
pub trait Transport: Debug {
    fn get(&self, endpoint: Endpoint, query: &[(String, String)]) -> Result<Value, OwmError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    pub(crate) type Call = (Endpoint, Vec<(String, String)>);
    type Responder = dyn Fn(Endpoint, &[(String, String)]) -> Result<Value, OwmError>;

    /// Answers every request with a closure and records what was asked.
    pub(crate) struct FakeTransport {
        responder: Box<Responder>,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl FakeTransport {
        pub(crate) fn new(
            responder: impl Fn(Endpoint, &[(String, String)]) -> Result<Value, OwmError> + 'static,
        ) -> (Self, Rc<RefCell<Vec<Call>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let transport = Self {
                responder: Box::new(responder),
                calls: Rc::clone(&calls),
            };
            (transport, calls)
        }
    }

    impl Debug for FakeTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FakeTransport")
                .field("calls", &self.calls.borrow().len())
                .finish()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, endpoint: Endpoint, query: &[(String, String)]) -> Result<Value, OwmError> {
            self.calls.borrow_mut().push((endpoint, query.to_vec()));
            (self.responder)(endpoint, query)
        }
    }

    pub(crate) fn param<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
        query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}
