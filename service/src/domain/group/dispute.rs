//! [`Dispute`] definitions.

use common::{define_kind, DateTime};
use derive_more::{AsRef, Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    group::{Error, Group},
    user,
};
#[cfg(doc)]
use crate::domain::group::Participant;

/// Advisory record of a conflict between [`Participant`]s of a [`Group`].
///
/// [`Dispute`]s never affect the [`Group`] state by themselves.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dispute {
    /// ID of this [`Dispute`].
    pub id: Id,

    /// ID of the [`user::User`] who reported this [`Dispute`].
    pub reporter_id: user::Id,

    /// ID of the [`user::User`] this [`Dispute`] is raised against, if any.
    pub against_id: Option<user::Id>,

    /// [`Kind`] of this [`Dispute`].
    pub kind: Kind,

    /// [`Description`] of this [`Dispute`].
    pub description: Description,

    /// [`Status`] of this [`Dispute`].
    pub status: Status,

    /// Resolution [`Note`] of this [`Dispute`], once resolved or closed.
    pub resolution: Option<Note>,

    /// [`DateTime`] when this [`Dispute`] was opened.
    pub opened_at: DateTime,

    /// [`DateTime`] when this [`Dispute`] was taken for investigation.
    pub investigated_at: Option<DateTime>,

    /// [`DateTime`] when this [`Dispute`] was resolved or closed.
    pub resolved_at: Option<DateTime>,
}

/// ID of a [`Dispute`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Kind of a [`Dispute`]."]
    enum Kind {
        #[doc = "Contribution wasn't paid."]
        NonPayment = 1,

        #[doc = "Contribution was paid late."]
        LatePayment = 2,

        #[doc = "Payout wasn't received or was wrong."]
        PayoutIssue = 3,

        #[doc = "Misbehaviour of a participant."]
        Conduct = 4,

        #[doc = "Anything else."]
        Other = 5,
    }
}

define_kind! {
    #[doc = "Status of a [`Dispute`]."]
    enum Status {
        #[doc = "Reported and waiting for a review."]
        Open = 1,

        #[doc = "Being investigated."]
        Investigating = 2,

        #[doc = "Settled with a resolution."]
        Resolved = 3,

        #[doc = "Dismissed without a resolution."]
        Closed = 4,
    }
}

impl Status {
    /// Indicates whether a [`Dispute`] may move from this [`Status`] into the
    /// provided one.
    #[must_use]
    pub const fn can_become(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Open, Self::Investigating)
                | (
                    Self::Open | Self::Investigating,
                    Self::Resolved | Self::Closed
                )
        )
    }
}

/// Free-form description of a [`Dispute`].
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[serde(try_from = "String", into = "String")]
pub struct Description(String);

impl Description {
    /// Creates a new [`Description`] if the given `text` is valid.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let len = text.trim().chars().count();
        (len > 0 && len <= 2000).then_some(Self(text))
    }
}

impl TryFrom<String> for Description {
    type Error = &'static str;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(text).ok_or("invalid `Description`")
    }
}

impl From<Description> for String {
    fn from(description: Description) -> Self {
        description.0
    }
}

/// Note left when a [`Dispute`] is resolved or closed.
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[serde(try_from = "String", into = "String")]
pub struct Note(String);

impl Note {
    /// Creates a new [`Note`] if the given `text` is valid.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let len = text.trim().chars().count();
        (len > 0 && len <= 2000).then_some(Self(text))
    }
}

impl TryFrom<String> for Note {
    type Error = &'static str;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(text).ok_or("invalid `Note`")
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.0
    }
}

impl Group {
    /// Opens a new [`Dispute`] in this [`Group`].
    ///
    /// # Errors
    ///
    /// With [`Error::NotParticipant`] if the reporter or the accused
    /// [`user::User`] doesn't participate in this [`Group`].
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    pub fn open_dispute(
        &mut self,
        reporter_id: user::Id,
        against_id: Option<user::Id>,
        kind: Kind,
        description: Description,
        now: DateTime,
    ) -> Result<&Dispute, Error> {
        if !self.is_participant(reporter_id) {
            return Err(Error::NotParticipant(reporter_id));
        }
        if let Some(id) = against_id.filter(|&id| !self.is_participant(id)) {
            return Err(Error::NotParticipant(id));
        }

        self.disputes.push(Dispute {
            id: Id::new(),
            reporter_id,
            against_id,
            kind,
            description,
            status: Status::Open,
            resolution: None,
            opened_at: now,
            investigated_at: None,
            resolved_at: None,
        });
        self.last_activity_at = now;
        Ok(self.disputes.last().expect("just pushed"))
    }

    /// Moves the [`Dispute`] with the provided [`Id`] into the provided
    /// [`Status`].
    ///
    /// # Errors
    ///
    /// - With [`Error::DisputeNotExists`] if there is no such [`Dispute`].
    /// - With [`Error::DisputeTransition`] if the [`Dispute`] can't move into
    ///   the provided [`Status`].
    pub fn move_dispute(
        &mut self,
        id: Id,
        to: Status,
        note: Option<Note>,
        now: DateTime,
    ) -> Result<&Dispute, Error> {
        let dispute = self
            .disputes
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(Error::DisputeNotExists(id))?;
        if !dispute.status.can_become(to) {
            return Err(Error::DisputeTransition {
                from: dispute.status,
                to,
            });
        }

        dispute.status = to;
        match to {
            Status::Investigating => dispute.investigated_at = Some(now),
            Status::Resolved | Status::Closed => {
                dispute.resolution = note;
                dispute.resolved_at = Some(now);
            }
            Status::Open => {}
        }
        self.last_activity_at = now;
        Ok(dispute)
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::domain::{
        group::{spec::group, Error},
        user,
    };

    use super::{Description, Kind, Note, Status};

    #[test]
    fn validates_texts_when_deserializing() {
        let description: Description =
            serde_json::from_str(r#""Never paid""#).unwrap();
        assert_eq!(description, Description::new("Never paid").unwrap());
        assert!(serde_json::from_str::<Description>(r#""   ""#).is_err());
        assert!(serde_json::from_str::<Note>(r#""""#).is_err());

        let too_long = serde_json::to_string(&"x".repeat(2001)).unwrap();
        assert!(serde_json::from_str::<Note>(&too_long).is_err());
    }

    #[test]
    fn moves_through_investigation() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let mut g = group(creator, 3, now);

        let id = g
            .open_dispute(
                creator,
                None,
                Kind::PayoutIssue,
                Description::new("payout is late").unwrap(),
                now,
            )
            .unwrap()
            .id;

        let d = g.move_dispute(id, Status::Investigating, None, now).unwrap();
        assert_eq!(d.status, Status::Investigating);
        assert!(d.investigated_at.is_some());

        let d = g
            .move_dispute(
                id,
                Status::Resolved,
                Note::new("paid in cash"),
                now,
            )
            .unwrap();
        assert_eq!(d.status, Status::Resolved);
        assert_eq!(
            d.resolution.as_ref().map(AsRef::<str>::as_ref),
            Some("paid in cash"),
        );
        assert!(d.resolved_at.is_some());

        assert!(matches!(
            g.move_dispute(id, Status::Closed, None, now),
            Err(Error::DisputeTransition {
                from: Status::Resolved,
                to: Status::Closed,
            }),
        ));
    }

    #[test]
    fn requires_participants() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let stranger = user::Id::new();
        let mut g = group(creator, 3, now);

        assert!(matches!(
            g.open_dispute(
                stranger,
                None,
                Kind::Other,
                Description::new("?").unwrap(),
                now,
            ),
            Err(Error::NotParticipant(id)) if id == stranger,
        ));
        assert!(matches!(
            g.open_dispute(
                creator,
                Some(stranger),
                Kind::Conduct,
                Description::new("rude").unwrap(),
                now,
            ),
            Err(Error::NotParticipant(id)) if id == stranger,
        ));
        assert!(g.disputes.is_empty());
    }

    #[test]
    fn follows_dispute_state_machine() {
        use Status as S;

        assert!(S::Open.can_become(S::Investigating));
        assert!(S::Open.can_become(S::Closed));
        assert!(S::Investigating.can_become(S::Resolved));
        assert!(S::Investigating.can_become(S::Closed));
        assert!(!S::Investigating.can_become(S::Open));
        assert!(!S::Resolved.can_become(S::Investigating));
        assert!(!S::Closed.can_become(S::Resolved));
    }
}
