use super::{Ready, Token};

/// One readiness notification returned from a `wait` call.
#[derive(Copy, Clone, Debug)]
pub struct Event {
    kind: Ready,
    token: Token,
}

impl Event {
    pub fn new(kind: Ready, token: Token) -> Event {
        Event { kind, token }
    }

    pub fn kind(&self) -> Ready {
        self.kind
    }

    pub fn token(&self) -> Token {
        self.token
    }
}
