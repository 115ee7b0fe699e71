//! Scheduling of [`Round`]s and payout rotation.
//!
//! Periods are fixed (see [`Frequency::period()`]), so the same inputs always
//! produce the same schedule regardless of calendar months.

use common::{Currency, DateTime, Money};

use crate::domain::group::{round, Frequency, Participant, Position, Round};

/// Generates `count` consecutive [`Round`] placeholders starting at `start`.
///
/// Every [`Round`] lasts a single [`Frequency::period()`] and pays out to the
/// [`Position`] equal to its [`round::Number`]. The first one is
/// [`round::Status::Pending`] and the rest are [`round::Status::Scheduled`].
#[must_use]
pub fn generate(
    count: u8,
    start: DateTime,
    frequency: Frequency,
    currency: Currency,
) -> Vec<Round> {
    let period = frequency.period();

    let mut rounds = Vec::with_capacity(usize::from(count));
    let mut number = round::Number::FIRST;
    let mut starts_at = start;
    for _ in 0..count {
        let due_at = starts_at + period;
        rounds.push(Round {
            number,
            recipient_position: number.into(),
            recipient_id: None,
            starts_at,
            due_at,
            status: if number == round::Number::FIRST {
                round::Status::Pending
            } else {
                round::Status::Scheduled
            },
            expected_payers: vec![],
            payments: vec![],
            total_collected: Money::zero(currency),
            completed_at: None,
        });
        number = number.next();
        starts_at = due_at;
    }
    rounds
}

/// Returns the due [`DateTime`] of the last of the provided [`Round`]s.
#[must_use]
pub fn end_date(rounds: &[Round]) -> Option<DateTime> {
    rounds.last().map(|r| r.due_at)
}

/// Returns the lowest [`Position`] among [`Participant`]s who haven't received
/// the payout yet.
///
/// [`None`] means everyone has received, so the rotation is over.
#[must_use]
pub fn next_recipient(participants: &[Participant]) -> Option<Position> {
    participants
        .iter()
        .filter(|p| !p.has_received)
        .map(|p| p.position)
        .min()
}

#[cfg(test)]
mod spec {
    use common::{Currency, DateTime};

    use crate::domain::{
        group::{round, spec::day, Frequency, Participant, Position},
        user,
    };

    use super::{end_date, generate, next_recipient};

    #[test]
    fn generates_consecutive_rounds() {
        let start = DateTime::from_rfc3339("2026-11-01T00:00:00Z").unwrap();

        let rounds = generate(3, start, Frequency::Weekly, Currency::Usd);

        assert_eq!(rounds.len(), 3);
        for (i, r) in rounds.iter().enumerate() {
            let n = u8::try_from(i + 1).unwrap();
            assert_eq!(u8::from(r.number), n);
            assert_eq!(u8::from(r.recipient_position), n);
            assert_eq!(r.due_at - r.starts_at, day() * 7);
            assert!(!r.total_collected.is_positive());
        }
        assert_eq!(rounds[0].status, round::Status::Pending);
        assert_eq!(rounds[1].status, round::Status::Scheduled);
        assert_eq!(rounds[1].starts_at, rounds[0].due_at);
        assert_eq!(
            end_date(&rounds).map(|d| d.to_rfc3339()).as_deref(),
            Some("2026-11-22T00:00:00Z"),
        );
    }

    #[test]
    fn generates_nothing_for_zero() {
        let rounds =
            generate(0, DateTime::now(), Frequency::Monthly, Currency::Htg);

        assert!(rounds.is_empty());
        assert!(end_date(&rounds).is_none());
    }

    #[test]
    fn picks_lowest_position_not_received() {
        let now = DateTime::now();
        let mut participants = (1..=3_u8)
            .map(|p| Participant::member(user::Id::new(), p.into(), now))
            .collect::<Vec<_>>();

        assert_eq!(next_recipient(&participants), Some(Position::FIRST));

        participants[0].has_received = true;
        assert_eq!(next_recipient(&participants).map(u8::from), Some(2));

        participants[1].has_received = true;
        participants[2].has_received = true;
        assert_eq!(next_recipient(&participants), None);
    }
}
