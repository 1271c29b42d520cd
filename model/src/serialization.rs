use super::selection::TrackInclusion;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub const ALL_TRACKS: &str = "ALL";

impl Serialize for TrackInclusion {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TrackInclusion::All => s.serialize_str(ALL_TRACKS),
            TrackInclusion::Only(track_ids) => track_ids.serialize(s),
        }
    }
}

impl<'de> Deserialize<'de> for TrackInclusion {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Marker(String),
            Tracks(Vec<String>),
        }

        match Raw::deserialize(d)? {
            Raw::Marker(marker) if marker == ALL_TRACKS => Ok(TrackInclusion::All),
            Raw::Marker(marker) => Err(de::Error::custom(format!(
                "expected \"{}\" or a list of track ids, got \"{}\"",
                ALL_TRACKS, marker
            ))),
            Raw::Tracks(track_ids) => Ok(TrackInclusion::Only(track_ids)),
        }
    }
}

pub mod duration_millis {
    use serde::{de, Deserialize, Serializer};
    use std::time::Duration;

    /// Deserialize from milliseconds (represented as u64)
    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let millis: u64 = Deserialize::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }

    /// Serialize to milliseconds (represented as u64)
    pub fn serialize<S>(x: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_u64(x.as_millis() as u64)
    }
}
