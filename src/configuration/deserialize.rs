pub mod duration {
    use crate::time::timeunit::DurationUnit;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .parse::<DurationUnit>()
            .map(Duration::from)
            .map_err(|err| D::Error::custom(err.to_string()))
    }
}

pub mod mode {
    use crate::app::node::CollectorMode;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<CollectorMode, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse::<CollectorMode>()
            .map_err(D::Error::custom)
    }
}
