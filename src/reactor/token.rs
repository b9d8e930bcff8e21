/// Opaque identifier carried through an epoll registration.
///
/// The reactor never interprets a `Token`; the engine that owns both
/// the reactor and the connection pool sets it equal to the `ConnId`
/// of the connection being registered, so a readiness event resolves
/// back to its connection with a single slab lookup (see §3.1 of the
/// design notes).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub usize);

impl From<usize> for Token {
    #[inline]
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    #[inline]
    fn from(val: Token) -> usize {
        val.0
    }
}
