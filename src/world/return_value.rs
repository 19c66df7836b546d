use thiserror::Error;

/// Outcome code of every Cylinder query and world transaction. The text is
/// technical; translating codes for players is the protocol layer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ReturnValue {
    #[error("no error")]
    NoError,
    #[error("not possible")]
    NotPossible,
    #[error("destination slot holds an item that must be exchanged")]
    NeedExchange,
    #[error("not enough room")]
    NotEnoughRoom,
    #[error("not enough capacity")]
    NotEnoughCapacity,
    #[error("thing is not moveable")]
    NotMoveable,
    #[error("item cannot be picked up")]
    CannotPickup,
    #[error("item cannot be dressed in this slot")]
    CannotBeDressed,
    #[error("container cannot hold itself")]
    ThisIsImpossible,
    #[error("container is full")]
    ContainerNotEnoughRoom,
    #[error("depot is full")]
    DepotIsFull,
    #[error("too far away")]
    TooFarAway,
    #[error("there is no way")]
    ThereIsNoWay,
}

impl ReturnValue {
    pub fn is_ok(self) -> bool {
        self == ReturnValue::NoError
    }

    pub fn into_result(self) -> Result<(), ReturnValue> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Result<(), ReturnValue>> for ReturnValue {
    fn from(result: Result<(), ReturnValue>) -> Self {
        result.err().unwrap_or(ReturnValue::NoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_convert_to_results() {
        assert_eq!(ReturnValue::NoError.into_result(), Ok(()));
        assert_eq!(
            ReturnValue::NotEnoughRoom.into_result(),
            Err(ReturnValue::NotEnoughRoom)
        );
        assert_eq!(ReturnValue::from(Err(ReturnValue::NotMoveable)), ReturnValue::NotMoveable);
        assert_eq!(ReturnValue::from(Ok(())), ReturnValue::NoError);
        assert_eq!(ReturnValue::DepotIsFull.to_string(), "depot is full");
    }
}
