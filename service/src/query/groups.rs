//! [`Query`] collection related to multiple [`Group`]s.

use common::operations::By;

use crate::domain::{user, Group};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries [`Group`]s a [`user::User`] created or participates in, the most
/// recently created first.
pub type ForUser = DatabaseQuery<By<Vec<Group>, user::Id>>;

#[cfg(test)]
mod spec {
    use crate::{
        command::{JoinGroup, LeaveGroup},
        domain::user,
        query,
        testing::{self, active_group, create_group},
        Command as _, Query as _,
    };

    use super::ForUser;

    #[tokio::test]
    async fn lists_created_and_joined_groups() {
        let svc = testing::service();
        let (joined, users) = active_group(&svc, 3).await;
        let created = svc.execute(create_group(users[1], 4)).await.unwrap();

        let groups = svc.execute(ForUser::by(users[1])).await.unwrap();
        let mut ids = groups.iter().map(|g| g.id).collect::<Vec<_>>();
        ids.sort_unstable();
        let mut expected = vec![joined.id, created.id];
        expected.sort_unstable();
        assert_eq!(ids, expected);

        let none = svc.execute(ForUser::by(user::Id::new())).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn finds_only_running_groups_by_access_code() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let found = svc
            .execute(query::group::ByAccessCode::by(g.access_code.clone()))
            .await
            .unwrap();
        assert_eq!(found.map(|g| g.id), Some(g.id));

        let mut recruiting =
            svc.execute(create_group(users[0], 5)).await.unwrap();
        let members = [user::Id::new(), user::Id::new()];
        for &id in &members {
            recruiting = svc
                .execute(JoinGroup {
                    initiator: user::Identity::user(id),
                    access_code: recruiting.access_code.clone(),
                })
                .await
                .unwrap();
        }
        let cancelled = svc
            .execute(LeaveGroup {
                initiator: user::Identity::user(members[0]),
                group_id: recruiting.id,
                reason: None,
            })
            .await
            .unwrap();
        assert!(cancelled.status.is_terminal());

        let by_code = svc
            .execute(query::group::ByAccessCode::by(cancelled.access_code))
            .await
            .unwrap();
        let by_id = svc
            .execute(query::group::ById::by(cancelled.id))
            .await
            .unwrap();
        assert!(by_code.is_none());
        assert!(by_id.is_some());
    }
}
