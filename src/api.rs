pub mod error;
pub mod experiment;
pub mod id;
pub mod metric;
pub mod model;
pub mod repository;
pub mod run;

// serialize Option<Duration> as whole nanoseconds so the value survives any
// JSON backend exactly
mod opt_duration_nanos {
    use std::convert::TryFrom;
    use std::time::Duration;

    use serde::de::{Deserialize, Deserializer};
    use serde::ser::{self, Serialize, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = Option::<u64>::deserialize(deserializer)?;
        Ok(nanos.map(Duration::from_nanos))
    }

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => {
                let nanos = u64::try_from(duration.as_nanos()).map_err(ser::Error::custom)?;
                Some(nanos).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }
}
