/// Expected, recoverable command outcomes. Every variant is reported back to
/// the invoking participant as a render card and never escalates past the
/// command boundary. The one exception is `DataUnavailable` on catalog load
/// at process start, which the daemon treats as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("you are not registered (try: register)")]
    NotRegistered,
    #[error("you are already registered")]
    AlreadyRegistered,
    #[error("you have no ship selected (try: select <name>)")]
    NoShipSelected,
    #[error("your ship is already chosen, and the choice is permanent")]
    AlreadySelected,
    #[error("no ship named \"{0}\" exists")]
    UnknownShip(String),
    #[error("you do not own \"{0}\"")]
    NotOwned(String),
    #[error("you already own \"{0}\"")]
    AlreadyOwned(String),
    #[error("insufficient funds: {name} costs {price}, you have {balance}")]
    InsufficientFunds {
        name: String,
        price: i64,
        balance: i64,
    },
    #[error("nothing to fight right now; wait for the next wreck to drift in")]
    NoEncounterActive,
    #[error("the spacers ignore you; try again in {remaining_s}s")]
    OnCooldown { remaining_s: i64 },
    #[error("game data is unavailable: {0}")]
    DataUnavailable(String),
    #[error("channel {0} is not resolvable")]
    ChannelUnresolvable(u64),
}
