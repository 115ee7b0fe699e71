//! Recording of [`Payment`]s and settlement of [`Round`]s.

use common::{DateTime, Money};

use crate::domain::{
    group::{
        payment, round, schedule, Error, Group, Payment, Position, Round,
        Status,
    },
    user,
};

/// Outcome of [`Group::record_payment()`].
#[derive(Clone, Debug)]
pub struct Recorded {
    /// Recorded (or amended) [`Payment`].
    pub payment: Payment,

    /// Indicator whether the [`Payment`] was made after the grace period.
    pub is_late: bool,

    /// Indicator whether the [`Round`] became fully paid.
    pub completes_round: bool,
}

/// Outcome of [`Group::settle_round()`].
#[derive(Clone, Copy, Debug)]
pub struct Settlement {
    /// [`round::Number`] of the settled [`Round`].
    pub round: round::Number,

    /// ID of the [`user::User`] receiving the payout.
    pub recipient_id: user::Id,

    /// [`Position`] of the recipient.
    pub recipient_position: Position,

    /// Pooled amount to be paid out.
    pub amount: Money,
}

impl Group {
    /// Records a contribution of the provided [`user::User`] to the current
    /// [`Round`].
    ///
    /// If `round` is specified, it must point to the current [`Round`].
    ///
    /// # Errors
    ///
    /// - With [`Error::UnexpectedStatus`] if this [`Group`] isn't active.
    /// - With [`Error::NotParticipant`] if the payer isn't expected to pay
    ///   for the current [`Round`].
    /// - With [`Error::RoundNotOpen`] if `round` isn't the current one.
    /// - With [`Error::CurrencyMismatch`] or [`Error::InvalidAmount`] if the
    ///   `amount` doesn't fit the contribution.
    /// - With [`Error::Overpayment`] if an instalment exceeds the outstanding
    ///   contribution.
    /// - With [`Error::DuplicatePayment`] if the payer already paid.
    pub fn record_payment(
        &mut self,
        payer_id: user::Id,
        amount: Money,
        method: payment::Method,
        round: Option<round::Number>,
        transaction_ref: Option<payment::TransactionRef>,
        now: DateTime,
    ) -> Result<Recorded, Error> {
        if self.status != Status::Active {
            return Err(Error::UnexpectedStatus(self.status));
        }
        if !self.is_participant(payer_id) {
            return Err(Error::NotParticipant(payer_id));
        }
        let number = round.unwrap_or(self.current_round);
        if number != self.current_round {
            return Err(Error::RoundNotOpen(number));
        }

        if amount.currency != self.contribution.currency {
            return Err(Error::CurrencyMismatch {
                expected: self.contribution.currency,
                actual: amount.currency,
            });
        }
        if !amount.is_positive() {
            return Err(Error::InvalidAmount(amount));
        }
        if !self.rules.allow_partial_payments && amount != self.contribution {
            return Err(Error::InvalidAmount(amount));
        }

        let contribution = self.contribution;
        let deadline = self.current_deadline();
        let Some(round) = self.rounds.iter_mut().find(|r| r.number == number)
        else {
            return Err(Error::RoundNotOpen(number));
        };
        if round.status != round::Status::Active {
            return Err(Error::RoundNotOpen(number));
        }
        if !round.expected_payers.contains(&payer_id) {
            return Err(Error::NotParticipant(payer_id));
        }

        let existing = round.payments.iter().position(|p| p.payer_id == payer_id);
        let paid_before = match existing.map(|i| &round.payments[i]) {
            Some(p) if p.status.is_settled() => {
                return Err(Error::DuplicatePayment {
                    payer_id,
                    round: number,
                });
            }
            Some(p) => p.amount,
            None => Money::zero(contribution.currency),
        };

        let paid = paid_before
            .checked_add(amount)
            .ok_or(Error::InvalidAmount(amount))?;
        if paid.amount > contribution.amount {
            return Err(Error::Overpayment(Money::new(
                contribution.amount - paid_before.amount,
                contribution.currency,
            )));
        }

        let after_grace = deadline.is_some_and(|d| now > d);
        let status = if paid.amount < contribution.amount {
            payment::Status::Partial
        } else if after_grace {
            payment::Status::Overdue
        } else {
            payment::Status::Paid
        };

        let payment = Payment {
            round: number,
            payer_id,
            amount: paid,
            paid_at: now,
            method,
            status,
            transaction_ref,
        };
        match existing {
            Some(i) => round.payments[i] = payment.clone(),
            None => round.payments.push(payment.clone()),
        }
        round.total_collected = round
            .total_collected
            .checked_add(amount)
            .ok_or(Error::InvalidAmount(amount))?;
        let completes_round = round.is_fully_paid();

        let is_late = status == payment::Status::Overdue;
        if is_late {
            if let Some(p) =
                self.participants.iter_mut().find(|p| p.user_id == payer_id)
            {
                p.warning_count = p.warning_count.saturating_add(1);
            }
        }
        self.last_activity_at = now;

        Ok(Recorded {
            payment,
            is_late,
            completes_round,
        })
    }

    /// Settles the current fully paid [`Round`]: writes its history entry,
    /// marks its recipient as paid out and moves the rotation forward.
    ///
    /// Once every [`Participant`] has received, this [`Group`] is completed.
    /// Otherwise, the next [`Round`] opens for payments.
    ///
    /// # Errors
    ///
    /// - With [`Error::UnexpectedStatus`] if this [`Group`] isn't active.
    /// - With [`Error::RoundNotComplete`] if the current [`Round`] isn't fully
    ///   paid yet.
    ///
    /// [`Participant`]: crate::domain::group::Participant
    pub fn settle_round(&mut self, now: DateTime) -> Result<Settlement, Error> {
        if self.status != Status::Active {
            return Err(Error::UnexpectedStatus(self.status));
        }
        let number = self.current_round;
        let round = self
            .rounds
            .iter_mut()
            .find(|r| r.number == number)
            .filter(|r| r.status == round::Status::Active && r.is_fully_paid())
            .ok_or(Error::RoundNotComplete(number))?;

        let recipient_position = round.recipient_position;
        let Some(recipient) = self
            .participants
            .iter_mut()
            .find(|p| p.position == recipient_position)
        else {
            return Err(Error::RoundNotComplete(number));
        };

        round.status = round::Status::Completed;
        round.completed_at = Some(now);
        let amount = round.total_collected;
        let summary = round.summary();

        recipient.has_received = true;
        recipient.received_at = Some(now);
        recipient.received_amount = Some(amount);
        let recipient_id = recipient.user_id;

        self.history.push(round::HistoryEntry {
            round: number,
            recipient_id,
            recipient_position,
            amount,
            summary,
            completed_at: now,
        });

        self.current_round = number.next();
        self.next_recipient_position =
            schedule::next_recipient(&self.participants);
        if self.next_recipient_position.is_some() {
            self.open_current_round();
            self.last_activity_at = now;
        } else {
            self.transition(Status::Completed, None, now)?;
        }

        Ok(Settlement {
            round: number,
            recipient_id,
            recipient_position,
            amount,
        })
    }

    /// Opens the current [`Round`] for payments, capturing the
    /// [`Participant`]s expected to pay.
    ///
    /// [`Participant`]: crate::domain::group::Participant
    pub(super) fn open_current_round(&mut self) {
        let payers = self.participants.iter().map(|p| p.user_id).collect();
        let number = self.current_round;
        if let Some(round) = self.rounds.iter_mut().find(|r| r.number == number)
        {
            round.status = round::Status::Active;
            round.expected_payers = payers;
        }
    }

    /// Returns the [`DateTime`] after which contributions to the current
    /// [`Round`] are late.
    fn current_deadline(&self) -> Option<DateTime> {
        self.current()
            .map(|r: &Round| r.due_at + self.rules.grace_period())
    }
}

#[cfg(test)]
mod spec {
    use common::{Currency, DateTime, Money};
    use rust_decimal::Decimal;

    use crate::domain::{
        group::{
            payment, round,
            spec::{day, group},
            Error, Group, Participant, Status,
        },
        user,
    };

    fn htg(amount: i64) -> Money {
        Money::new(Decimal::from(amount), Currency::Htg)
    }

    fn active(now: DateTime) -> (Group, [user::Id; 3]) {
        let members = [user::Id::new(), user::Id::new(), user::Id::new()];
        let mut g = group(members[0], 3, now);
        g.participants
            .push(Participant::member(members[1], 2_u8.into(), now));
        g.participants
            .push(Participant::member(members[2], 3_u8.into(), now));
        g.start(now).unwrap();
        (g, members)
    }

    fn pay(g: &mut Group, payer: user::Id, now: DateTime) -> bool {
        g.record_payment(
            payer,
            htg(1000),
            payment::Method::Cash,
            None,
            None,
            now,
        )
        .unwrap()
        .completes_round
    }

    #[test]
    fn completes_round_once_everyone_paid() {
        let now = DateTime::now();
        let (mut g, [a, b, c]) = active(now);

        assert!(!pay(&mut g, a, now));
        assert!(!pay(&mut g, b, now));
        assert!(matches!(g.settle_round(now), Err(Error::RoundNotComplete(_))));
        assert!(pay(&mut g, c, now));

        let settlement = g.settle_round(now).unwrap();

        assert_eq!(settlement.recipient_id, a);
        assert_eq!(settlement.amount, htg(3000));
        assert_eq!(u8::from(g.current_round), 2);
        assert_eq!(g.next_recipient_position.map(u8::from), Some(2));
        assert_eq!(g.rounds[0].status, round::Status::Completed);
        assert_eq!(g.rounds[1].status, round::Status::Active);
        assert!(g.participant(a).unwrap().has_received);
        assert_eq!(g.participant(a).unwrap().received_amount, Some(htg(3000)));
        assert_eq!(g.history.len(), 1);
        assert_eq!(g.history[0].summary.on_time, 3);
    }

    #[test]
    fn completes_group_after_last_round() {
        let now = DateTime::now();
        let (mut g, members) = active(now);

        for _ in 0..3 {
            for &m in &members {
                _ = pay(&mut g, m, now);
            }
            _ = g.settle_round(now).unwrap();
        }

        assert_eq!(g.status, Status::Completed);
        assert_eq!(u8::from(g.current_round), 4);
        assert_eq!(g.next_recipient_position, None);
        assert!(g.participants.iter().all(|p| p.has_received));
        assert!(g.current().is_none());
        assert!(matches!(
            g.record_payment(
                members[0],
                htg(1000),
                payment::Method::Cash,
                None,
                None,
                now,
            ),
            Err(Error::UnexpectedStatus(Status::Completed)),
        ));
    }

    #[test]
    fn rejects_duplicate_payment() {
        let now = DateTime::now();
        let (mut g, [a, ..]) = active(now);

        _ = pay(&mut g, a, now);
        let err = g
            .record_payment(a, htg(1000), payment::Method::Cash, None, None, now)
            .unwrap_err();

        assert!(matches!(err, Error::DuplicatePayment { .. }));
        assert_eq!(g.rounds[0].total_collected, htg(1000));
        assert_eq!(g.rounds[0].payments.len(), 1);
    }

    #[test]
    fn rejects_wrong_amount_without_partials() {
        let now = DateTime::now();
        let (mut g, [a, ..]) = active(now);

        for amount in [htg(500), htg(0), htg(-1000), htg(1500)] {
            assert!(matches!(
                g.record_payment(
                    a,
                    amount,
                    payment::Method::Cash,
                    None,
                    None,
                    now,
                ),
                Err(Error::InvalidAmount(_)),
            ));
        }
        assert!(matches!(
            g.record_payment(
                a,
                Money::new(Decimal::from(1000), Currency::Usd),
                payment::Method::Cash,
                None,
                None,
                now,
            ),
            Err(Error::CurrencyMismatch { .. }),
        ));
        assert!(g.rounds[0].payments.is_empty());
        assert!(!g.rounds[0].is_fully_paid());
    }

    #[test]
    fn merges_partial_instalments() {
        let now = DateTime::now();
        let (mut g, [a, ..]) = active(now);
        g.rules.allow_partial_payments = true;

        let first = g
            .record_payment(a, htg(400), payment::Method::Cash, None, None, now)
            .unwrap();
        assert_eq!(first.payment.status, payment::Status::Partial);

        assert!(matches!(
            g.record_payment(
                a,
                htg(700),
                payment::Method::Cash,
                None,
                None,
                now,
            ),
            Err(Error::Overpayment(m)) if m == htg(600),
        ));

        let second = g
            .record_payment(
                a,
                htg(600),
                payment::Method::MobileMoney,
                None,
                None,
                now,
            )
            .unwrap();
        assert_eq!(second.payment.status, payment::Status::Paid);
        assert_eq!(second.payment.amount, htg(1000));
        assert_eq!(g.rounds[0].payments.len(), 1);
        assert_eq!(g.rounds[0].total_collected, htg(1000));
        assert_eq!(g.rounds[0].summary().on_time, 1);
        assert_eq!(g.rounds[0].summary().missing, 2);
    }

    #[test]
    fn marks_late_payment_overdue() {
        let now = DateTime::now();
        let (mut g, [a, b, _]) = active(now);
        let late = g.rounds[0].due_at + day() * 3;

        let recorded = g
            .record_payment(a, htg(1000), payment::Method::Cash, None, None, late)
            .unwrap();
        assert!(recorded.is_late);
        assert_eq!(recorded.payment.status, payment::Status::Overdue);
        assert_eq!(g.participant(a).unwrap().warning_count, 1);

        let within_grace = g.rounds[0].due_at + day();
        let recorded = g
            .record_payment(
                b,
                htg(1000),
                payment::Method::Cash,
                None,
                None,
                within_grace,
            )
            .unwrap();
        assert!(!recorded.is_late);
        assert_eq!(g.participant(b).unwrap().warning_count, 0);

        let summary = g.rounds[0].summary();
        assert_eq!(summary.on_time, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.missing, 1);
    }

    #[test]
    fn rejects_payment_for_other_round() {
        let now = DateTime::now();
        let (mut g, [a, ..]) = active(now);

        assert!(matches!(
            g.record_payment(
                a,
                htg(1000),
                payment::Method::Cash,
                Some(2_u8.into()),
                None,
                now,
            ),
            Err(Error::RoundNotOpen(_)),
        ));
        assert!(matches!(
            g.record_payment(
                user::Id::new(),
                htg(1000),
                payment::Method::Cash,
                None,
                None,
                now,
            ),
            Err(Error::NotParticipant(_)),
        ));
    }
}
