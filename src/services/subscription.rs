//! Subscription service
//!
//! Follow / unfollow authors and list the authors a user follows, each with
//! a preview of their recipes.

use crate::db::repositories::{RecipeRepository, SubscriptionRepository, UserRepository};
use crate::models::{
    ListParams, PagedResult, RecipeSummary, SubscriptionProfile, User, UserProfile,
};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Error types for subscription operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionServiceError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    #[error("Already subscribed to this user")]
    AlreadySubscribed,

    #[error("Not subscribed to this user")]
    NotSubscribed,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Whether `viewer` follows `author_id`. Always false for anonymous viewers
/// and for the author looking at themselves.
pub(crate) async fn viewer_follows(
    repo: &dyn SubscriptionRepository,
    viewer: Option<i64>,
    author_id: i64,
) -> Result<bool> {
    match viewer {
        Some(viewer_id) if viewer_id != author_id => repo
            .exists(viewer_id, author_id)
            .await
            .context("Failed to check subscription"),
        _ => Ok(false),
    }
}

/// Subscription service
pub struct SubscriptionService {
    user_repo: Arc<dyn UserRepository>,
    subscription_repo: Arc<dyn SubscriptionRepository>,
    recipe_repo: Arc<dyn RecipeRepository>,
}

impl SubscriptionService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        subscription_repo: Arc<dyn SubscriptionRepository>,
        recipe_repo: Arc<dyn RecipeRepository>,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            recipe_repo,
        }
    }

    /// Follow `author_id`
    ///
    /// Returns the author's profile with their recipes, at most
    /// `recipes_limit` of them when given.
    pub async fn subscribe(
        &self,
        follower_id: i64,
        author_id: i64,
        recipes_limit: Option<i64>,
    ) -> Result<SubscriptionProfile, SubscriptionServiceError> {
        let author = self.require_user(author_id).await?;

        if follower_id == author_id {
            return Err(SubscriptionServiceError::SelfSubscription);
        }

        if !self
            .subscription_repo
            .add(follower_id, author_id)
            .await
            .context("Failed to create subscription")?
        {
            return Err(SubscriptionServiceError::AlreadySubscribed);
        }

        tracing::debug!(follower_id, author_id, "Subscribed");
        self.author_profile(&author, recipes_limit).await
    }

    /// Stop following `author_id`
    pub async fn unsubscribe(
        &self,
        follower_id: i64,
        author_id: i64,
    ) -> Result<(), SubscriptionServiceError> {
        self.require_user(author_id).await?;

        if !self
            .subscription_repo
            .remove(follower_id, author_id)
            .await
            .context("Failed to delete subscription")?
        {
            return Err(SubscriptionServiceError::NotSubscribed);
        }

        tracing::debug!(follower_id, author_id, "Unsubscribed");
        Ok(())
    }

    /// Page of authors followed by `follower_id`, in subscription order
    pub async fn list_subscriptions(
        &self,
        follower_id: i64,
        params: &ListParams,
        recipes_limit: Option<i64>,
    ) -> Result<PagedResult<SubscriptionProfile>, SubscriptionServiceError> {
        let total = self
            .subscription_repo
            .count_authors(follower_id)
            .await
            .context("Failed to count subscriptions")?;
        let authors = self
            .subscription_repo
            .list_authors(follower_id, params.offset(), params.limit())
            .await
            .context("Failed to list subscriptions")?;

        let mut items = Vec::with_capacity(authors.len());
        for author in &authors {
            items.push(self.author_profile(author, recipes_limit).await?);
        }

        Ok(PagedResult::new(items, total, params))
    }

    async fn require_user(&self, id: i64) -> Result<User, SubscriptionServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(SubscriptionServiceError::UserNotFound(id))
    }

    // Only called for authors the caller follows.
    async fn author_profile(
        &self,
        author: &User,
        recipes_limit: Option<i64>,
    ) -> Result<SubscriptionProfile, SubscriptionServiceError> {
        let limit = recipes_limit.filter(|l| *l >= 0);
        let recipes = self
            .recipe_repo
            .list_by_author(author.id, limit)
            .await
            .context("Failed to list author recipes")?;
        let recipes_count = self
            .recipe_repo
            .count_by_author(author.id)
            .await
            .context("Failed to count author recipes")?;

        Ok(SubscriptionProfile {
            profile: UserProfile::new(author, true),
            recipes: recipes.iter().map(RecipeSummary::from).collect(),
            recipes_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        IngredientRepository, SqlxIngredientRepository, SqlxRecipeRepository,
        SqlxSubscriptionRepository, SqlxUserRepository,
    };
    use crate::config::{DatabaseConfig, DatabaseDriver};
    use crate::db::{create_pool, create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CreateRecipeInput, Ingredient, IngredientAmount};

    struct Fixture {
        service: SubscriptionService,
        reader: i64,
        anna: i64,
        bob: i64,
    }

    async fn setup() -> Fixture {
        setup_on(create_test_pool().await.expect("Failed to create test pool")).await
    }

    async fn setup_on(pool: DynDatabasePool) -> Fixture {
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let mut ids = Vec::new();
        for name in ["reader", "anna", "bob"] {
            let user = User::new(
                format!("{}@example.com", name),
                name.to_string(),
                "First".to_string(),
                "Last".to_string(),
                "hash".to_string(),
            );
            ids.push(users.create(&user).await.unwrap().id);
        }

        let recipes = SqlxRecipeRepository::boxed(pool.clone());
        let salt = SqlxIngredientRepository::new(pool.clone())
            .create(&Ingredient::new("salt", "g"))
            .await
            .unwrap()
            .id;
        for name in ["Soup", "Stew", "Salad"] {
            let input = CreateRecipeInput {
                name: name.to_string(),
                text: "Cook it".to_string(),
                image: "img".to_string(),
                cooking_time: 15,
                tags: vec![1],
                ingredients: vec![IngredientAmount::new(salt, 5)],
            };
            recipes.create(ids[1], &input).await.unwrap();
        }

        Fixture {
            service: SubscriptionService::new(
                users,
                SqlxSubscriptionRepository::boxed(pool),
                recipes,
            ),
            reader: ids[0],
            anna: ids[1],
            bob: ids[2],
        }
    }

    #[tokio::test]
    async fn test_subscribe_returns_author_with_recipes() {
        let f = setup().await;

        let profile = f
            .service
            .subscribe(f.reader, f.anna, Some(2))
            .await
            .expect("subscribe");
        assert_eq!(profile.profile.username, "anna");
        assert!(profile.profile.is_subscribed);
        assert_eq!(profile.recipes.len(), 2);
        assert_eq!(profile.recipes_count, 3);
        assert_eq!(profile.recipes[0].name, "Salad");
    }

    #[tokio::test]
    async fn test_subscribe_errors() {
        let f = setup().await;

        assert!(matches!(
            f.service.subscribe(f.reader, 404, None).await,
            Err(SubscriptionServiceError::UserNotFound(404))
        ));
        assert!(matches!(
            f.service.subscribe(f.reader, f.reader, None).await,
            Err(SubscriptionServiceError::SelfSubscription)
        ));

        f.service.subscribe(f.reader, f.anna, None).await.unwrap();
        assert!(matches!(
            f.service.subscribe(f.reader, f.anna, None).await,
            Err(SubscriptionServiceError::AlreadySubscribed)
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let f = setup().await;

        assert!(matches!(
            f.service.unsubscribe(f.reader, f.anna).await,
            Err(SubscriptionServiceError::NotSubscribed)
        ));

        f.service.subscribe(f.reader, f.anna, None).await.unwrap();
        f.service.unsubscribe(f.reader, f.anna).await.expect("unsubscribe");

        let page = f
            .service
            .list_subscriptions(f.reader, &ListParams::default(), None)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_list_subscriptions_in_follow_order() {
        let f = setup().await;
        f.service.subscribe(f.reader, f.bob, None).await.unwrap();
        f.service.subscribe(f.reader, f.anna, None).await.unwrap();

        let page = f
            .service
            .list_subscriptions(f.reader, &ListParams::default(), Some(1))
            .await
            .unwrap();

        let names: Vec<_> = page.items.iter().map(|p| p.profile.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "anna"]);
        assert_eq!(page.items[0].recipes_count, 0);
        assert_eq!(page.items[1].recipes.len(), 1);
        assert_eq!(page.items[1].recipes_count, 3);
        assert!(page.items.iter().all(|p| p.profile.is_subscribed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_duplicate_subscribes_insert_once() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: dir.path().join("race.db").to_string_lossy().to_string(),
        })
        .await
        .expect("Failed to create pool");
        let f = setup_on(pool.clone()).await;
        let (reader, anna) = (f.reader, f.anna);
        let service = Arc::new(f.service);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.subscribe(reader, anna, None).await })
            })
            .collect();

        let mut added = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.expect("task panicked") {
                Ok(_) => added += 1,
                Err(SubscriptionServiceError::AlreadySubscribed) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!((added, conflicts), (1, 15));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
