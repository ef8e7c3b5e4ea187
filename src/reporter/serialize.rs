pub mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

pub mod failure {
    use crate::app::error::Failure;
    use serde::Serializer;

    pub fn serialize<S>(failure: &Option<Failure>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match failure {
            Some(failure) => serializer.serialize_some(&failure.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

pub mod failures {
    use crate::app::error::Failure;
    use serde::ser::SerializeSeq;
    use serde::Serializer;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(failures: &Vec<Failure>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(failures.len()))?;
        for failure in failures {
            seq.serialize_element(&failure.to_string())?;
        }
        seq.end()
    }
}
