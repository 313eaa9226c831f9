use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Field};
use crate::fayda_id::{self, LENGTH_MESSAGE};

/// Validated Fayda ID (12 ASCII digits).
///
/// Guaranteed valid by construction: holding a `FaydaId` proves the format is correct.
/// Use `"123456789012".parse::<FaydaId>()` for strict parsing or
/// [`FaydaId::from_input`] for operator-typed values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FaydaId(String);

impl FaydaId {
    /// Parses what the operator typed: non-digits are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on the `fayda_id` field if fewer or more than
    /// 12 digits remain.
    pub fn from_input(raw: &str) -> Result<Self, Error> {
        fayda_id::strip_non_digits(raw).try_into()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe rendering (last four digits only).
    #[must_use]
    pub fn masked(&self) -> String {
        fayda_id::mask(&self.0)
    }
}

impl std::fmt::Display for FaydaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FaydaId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for FaydaId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if fayda_id::is_valid_fayda_id(&s) {
            Ok(Self(s))
        } else {
            Err(Error::field(Field::FaydaId, LENGTH_MESSAGE))
        }
    }
}

impl From<FaydaId> for String {
    fn from(id: FaydaId) -> Self {
        id.0
    }
}

/// Backend host identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct HostId(pub i64);

/// Backend visit record identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct VisitId(pub i64);

/// Identity returned by the backend after a successful OIDC code exchange.
///
/// Only [`IdentityVerification::resume_from_callback`](crate::verification::IdentityVerification::resume_from_callback)
/// produces one in the workflows; it is never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct VisitorIdentity {
    /// Identifier reported by the identity provider. Kept as a string: the provider
    /// may answer with a FAN/FIN rather than the 12-digit number that was entered.
    pub fayda_id: String,
    pub name: String,
    #[serde(default, rename = "picture", alias = "picture_url")]
    pub picture_url: Option<String>,
    #[serde(default, with = "birthdate")]
    pub birthdate: Option<time::Date>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl VisitorIdentity {
    #[must_use]
    pub fn new(fayda_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fayda_id: fayda_id.into(),
            name: name.into(),
            picture_url: None,
            birthdate: None,
            gender: None,
        }
    }

    #[must_use]
    pub fn with_picture_url(mut self, url: impl Into<String>) -> Self {
        self.picture_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_birthdate(mut self, date: time::Date) -> Self {
        self.birthdate = Some(date);
        self
    }

    #[must_use]
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    /// "DOB: 1990-01-31 | Gender: Female", omitting what is unknown.
    #[must_use]
    pub fn extra_details(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(date) = self.birthdate {
            parts.push(format!("DOB: {date}"));
        }
        if let Some(gender) = &self.gender {
            parts.push(format!("Gender: {gender}"));
        }
        parts.join(" | ")
    }
}

/// Person a visitor can come to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    #[serde(default)]
    pub department: String,
}

impl Host {
    /// Dropdown label: "Name - Department".
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.department)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default, with = "birthdate")]
    pub birthdate: Option<time::Date>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Body of `POST checkin/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCheckin {
    pub fayda_id: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub host_id: HostId,
    pub reason: String,
    pub additional_info: AdditionalInfo,
}

impl NewCheckin {
    #[must_use]
    pub fn new(identity: &VisitorIdentity, host_id: HostId, reason: impl Into<String>) -> Self {
        Self {
            fayda_id: identity.fayda_id.clone(),
            name: identity.name.clone(),
            photo_url: identity.picture_url.clone(),
            host_id,
            reason: reason.into(),
            additional_info: AdditionalInfo {
                birthdate: identity.birthdate,
                gender: identity.gender.clone(),
            },
        }
    }
}

/// Backend answer to a successful check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinReceipt {
    pub id: VisitId,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub checkin_time: Option<OffsetDateTime>,
}

/// A visit as stored by the backend. The workflows only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct VisitRecord {
    pub id: VisitId,
    pub fayda_id: String,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub host_id: Option<HostId>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub additional_info: Option<AdditionalInfo>,
    #[serde(with = "time::serde::rfc3339")]
    pub checkin_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub checkout_time: Option<OffsetDateTime>,
}

impl VisitRecord {
    /// A visit with a check-in time and no check-out time.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.checkout_time.is_none()
    }
}

/// Backend answer to a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub id: VisitId,
    #[serde(with = "time::serde::rfc3339")]
    pub checkout_time: OffsetDateTime,
}

/// Dates as sent by the identity provider: `YYYY-MM-DD`, `YYYY/MM/DD`, or a full
/// timestamp whose date part is one of those.
pub(crate) mod birthdate {
    use serde::{Deserialize, Deserializer, Serializer, de, ser};
    use time::Date;
    use time::format_description::BorrowedFormatItem;
    use time::macros::format_description;

    const ISO: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
    const SLASHED: &[BorrowedFormatItem<'static>] = format_description!("[year]/[month]/[day]");

    pub(crate) fn parse(raw: &str) -> Result<Date, time::error::Parse> {
        let raw = raw.trim();
        let head = raw.get(..10).unwrap_or(raw);
        Date::parse(head, ISO).or_else(|_| Date::parse(head, SLASHED))
    }

    pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => {
                let formatted = date.format(ISO).map_err(ser::Error::custom)?;
                serializer.serialize_str(&formatted)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse(&raw).map_err(de::Error::custom))
            .transpose()
    }
}
