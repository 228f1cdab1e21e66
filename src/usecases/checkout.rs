use std::{collections::HashMap, sync::Arc};

use anyhow::Result as AnyResult;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    entities::users::UserEntity,
    repositories::{
        plans::PlanRepository, user_subscriptions::UserSubscriptionRepository,
        users::UserRepository,
    },
    value_objects::{
        checkout::{CheckoutSessionDto, CreateCheckoutSessionForm},
        enums::payment_modes::PaymentMode,
        plans::PlanDto,
    },
};
use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("product not found or inactive")]
    ProductNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("quantity is required and must be at least 1 for credit purchases")]
    InvalidQuantity,
    #[error("an active subscription for this product already exists")]
    SubscriptionExists,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::ProductNotFound | CheckoutError::UserNotFound => StatusCode::NOT_FOUND,
            CheckoutError::InvalidQuantity => StatusCode::BAD_REQUEST,
            CheckoutError::SubscriptionExists => StatusCode::CONFLICT,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type CheckoutResult<T> = std::result::Result<T, CheckoutError>;

pub struct CheckoutUseCase<U, P, S, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
}

impl<U, P, S, Stripe> CheckoutUseCase<U, P, S, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            user_repo,
            plan_repo,
            subscription_repo,
            stripe_client,
        }
    }

    pub async fn list_plans(&self) -> CheckoutResult<Vec<PlanDto>> {
        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "checkout: failed to list active plans");
            CheckoutError::Internal(err)
        })?;
        info!(plan_count = plans.len(), "checkout: active plans loaded");
        Ok(plans.into_iter().map(PlanDto::from).collect())
    }

    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        form: CreateCheckoutSessionForm,
    ) -> CheckoutResult<CheckoutSessionDto> {
        info!(
            %user_id,
            product_id = %form.product_id,
            payment_mode = %form.payment_mode,
            quantity = ?form.quantity,
            "checkout: create checkout session requested"
        );

        let quantity = Self::resolve_quantity(&form)?;

        let plan = self
            .plan_repo
            .find_active_by_product_ref(&form.product_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    product_id = %form.product_id,
                    db_error = ?err,
                    "checkout: failed to load plan"
                );
                CheckoutError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = CheckoutError::ProductNotFound;
                warn!(
                    %user_id,
                    product_id = %form.product_id,
                    status = err.status_code().as_u16(),
                    "checkout: unknown or inactive product"
                );
                err
            })?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "checkout: failed to load user");
                CheckoutError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = CheckoutError::UserNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "checkout: user not found"
                );
                err
            })?;

        if form.payment_mode == PaymentMode::Subscription {
            self.ensure_no_active_subscription(user_id, plan.id).await?;
        }

        let customer_id = self.resolve_customer_id(&user).await?;

        let unit_price = plan.price_minor;
        let credits_bought = i64::from(unit_price) * i64::from(quantity);
        let metadata = HashMap::from([
            ("userId".to_string(), user_id.to_string()),
            ("planId".to_string(), plan.id.to_string()),
            ("productId".to_string(), plan.stripe_product_id.clone()),
            ("quantity".to_string(), quantity.to_string()),
            ("unitPrice".to_string(), unit_price.to_string()),
            ("creditsBought".to_string(), credits_bought.to_string()),
            (
                "type".to_string(),
                form.payment_mode.purchase_type().to_string(),
            ),
            ("customerId".to_string(), customer_id.clone()),
        ]);

        info!(
            %user_id,
            plan_id = %plan.id,
            price_id = %plan.stripe_price_id,
            customer_id = %customer_id,
            quantity,
            credits_bought,
            "checkout: creating checkout session"
        );

        let session = self
            .stripe_client
            .create_checkout_session(
                &plan.stripe_price_id,
                form.payment_mode.checkout_mode(),
                Some(customer_id),
                quantity,
                metadata,
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan_id = %plan.id,
                    price_id = %plan.stripe_price_id,
                    error = ?err,
                    "checkout: stripe checkout session creation failed"
                );
                CheckoutError::Internal(err)
            })?;

        info!(
            %user_id,
            plan_id = %plan.id,
            session_id = %session.id,
            "checkout: checkout session created successfully"
        );

        Ok(CheckoutSessionDto {
            session_id: session.id,
            url: session.url,
        })
    }

    fn resolve_quantity(form: &CreateCheckoutSessionForm) -> CheckoutResult<i32> {
        match form.payment_mode {
            PaymentMode::CreditPurchase => match form.quantity {
                Some(quantity) if quantity >= 1 => Ok(quantity),
                _ => {
                    let err = CheckoutError::InvalidQuantity;
                    warn!(
                        product_id = %form.product_id,
                        quantity = ?form.quantity,
                        status = err.status_code().as_u16(),
                        "checkout: invalid quantity for credit purchase"
                    );
                    Err(err)
                }
            },
            PaymentMode::Subscription => Ok(1),
        }
    }

    async fn ensure_no_active_subscription(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> CheckoutResult<()> {
        let existing = self
            .subscription_repo
            .find_active_like_by_user_and_plan(user_id, plan_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %plan_id,
                    db_error = ?err,
                    "checkout: failed to check existing subscriptions"
                );
                CheckoutError::Internal(err)
            })?;

        if let Some(subscription) = existing {
            let err = CheckoutError::SubscriptionExists;
            warn!(
                %user_id,
                %plan_id,
                stripe_subscription_id = %subscription.stripe_subscription_id,
                subscription_status = %subscription.status,
                status = err.status_code().as_u16(),
                "checkout: active subscription already exists for plan"
            );
            return Err(err);
        }

        Ok(())
    }

    /// Resolves the Stripe customer for the user: stored reference first,
    /// then lookup by email, then creation. Newly resolved ids are persisted
    /// back onto the user row.
    async fn resolve_customer_id(&self, user: &UserEntity) -> CheckoutResult<String> {
        if let Some(customer_id) = user.stripe_customer_id.as_deref() {
            return Ok(customer_id.to_string());
        }

        let customer_id = match self.lookup_or_create_customer(user).await {
            Ok(customer_id) => customer_id,
            Err(err) => {
                error!(
                    user_id = %user.id,
                    error = ?err,
                    "checkout: failed to resolve stripe customer"
                );
                return Err(CheckoutError::Internal(err));
            }
        };

        self.user_repo
            .set_stripe_customer_id(user.id, &customer_id)
            .await
            .map_err(|err| {
                error!(
                    user_id = %user.id,
                    customer_id = %customer_id,
                    db_error = ?err,
                    "checkout: failed to persist stripe customer id"
                );
                CheckoutError::Internal(err)
            })?;

        Ok(customer_id)
    }

    async fn lookup_or_create_customer(&self, user: &UserEntity) -> AnyResult<String> {
        if let Some(existing) = self
            .stripe_client
            .find_customer_by_email(&user.email)
            .await?
        {
            info!(
                user_id = %user.id,
                customer_id = %existing,
                "checkout: reusing stripe customer found by email"
            );
            return Ok(existing);
        }

        let created = self.stripe_client.create_customer(&user.email, user.id).await?;
        info!(
            user_id = %user.id,
            customer_id = %created,
            "checkout: created stripe customer"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::eq;

    use crate::domain::entities::plans::PlanEntity;
    use crate::domain::entities::user_subscriptions::UserSubscriptionEntity;
    use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
    use crate::domain::repositories::{
        plans::MockPlanRepository, user_subscriptions::MockUserSubscriptionRepository,
        users::MockUserRepository,
    };
    use crate::payments::stripe_client::CheckoutSessionCreated;
    use crate::usecases::stripe_gateway::MockStripeGateway;

    fn sample_plan(product_ref: &str, price_minor: i32) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            name: "Basic".to_string(),
            price_minor,
            currency: "eur".to_string(),
            interval: None,
            stripe_product_id: product_ref.to_string(),
            stripe_price_id: "price_basic".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn sample_user(user_id: Uuid, customer_id: Option<&str>) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: user_id,
            email: "alice@example.com".to_string(),
            credits: 0,
            stripe_customer_id: customer_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_subscription(user_id: Uuid, plan_id: Uuid) -> UserSubscriptionEntity {
        let now = Utc::now();
        UserSubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            stripe_subscription_id: "sub_existing".to_string(),
            status: SubscriptionStatus::Active.to_string(),
            starts_at: now,
            ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn credit_purchase_form(quantity: Option<i32>) -> CreateCheckoutSessionForm {
        CreateCheckoutSessionForm {
            product_id: "plan_basic".to_string(),
            payment_mode: PaymentMode::CreditPurchase,
            quantity,
        }
    }

    #[tokio::test]
    async fn credit_purchase_builds_line_item_and_metadata_from_plan_price() {
        let user_id = Uuid::new_v4();
        let plan = sample_plan("plan_basic", 700);
        let plan_id = plan.id;

        let mut user_repo = MockUserRepository::new();
        let mut plan_repo = MockPlanRepository::new();
        let subscription_repo = MockUserSubscriptionRepository::new();
        let mut stripe = MockStripeGateway::new();

        plan_repo
            .expect_find_active_by_product_ref()
            .with(eq("plan_basic"))
            .returning(move |_| {
                let plan = plan.clone();
                Box::pin(async move { Ok(Some(plan)) })
            });

        let user = sample_user(user_id, Some("cus_1"));
        user_repo
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(Some(user)) })
            });

        stripe
            .expect_create_checkout_session()
            .withf(move |price_id, mode, customer, quantity, metadata| {
                price_id == "price_basic"
                    && mode == "payment"
                    && customer.as_deref() == Some("cus_1")
                    && *quantity == 5
                    && metadata.get("creditsBought").map(String::as_str) == Some("3500")
                    && metadata.get("unitPrice").map(String::as_str) == Some("700")
                    && metadata.get("quantity").map(String::as_str) == Some("5")
                    && metadata.get("type").map(String::as_str) == Some("credit_purchase")
                    && metadata.get("planId").map(String::as_str)
                        == Some(plan_id.to_string().as_str())
            })
            .returning(|_, _, _, _, _| {
                Ok(CheckoutSessionCreated {
                    id: "cs_test_1".to_string(),
                    url: "https://checkout.stripe.com/c/cs_test_1".to_string(),
                })
            });

        let usecase = CheckoutUseCase::new(
            Arc::new(user_repo),
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(stripe),
        );

        let dto = usecase
            .create_checkout_session(user_id, credit_purchase_form(Some(5)))
            .await
            .unwrap();

        assert_eq!(dto.session_id, "cs_test_1");
        assert_eq!(dto.url, "https://checkout.stripe.com/c/cs_test_1");
    }

    #[tokio::test]
    async fn subscription_checkout_conflicts_on_existing_active_subscription() {
        let user_id = Uuid::new_v4();
        let plan = sample_plan("plan_pro", 1900);
        let plan_id = plan.id;

        let mut user_repo = MockUserRepository::new();
        let mut plan_repo = MockPlanRepository::new();
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        // No expectations: a conflict must not reach Stripe at all.
        let stripe = MockStripeGateway::new();

        plan_repo
            .expect_find_active_by_product_ref()
            .with(eq("plan_pro"))
            .returning(move |_| {
                let plan = plan.clone();
                Box::pin(async move { Ok(Some(plan)) })
            });

        let user = sample_user(user_id, Some("cus_1"));
        user_repo
            .expect_find_by_id()
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(Some(user)) })
            });

        subscription_repo
            .expect_find_active_like_by_user_and_plan()
            .with(eq(user_id), eq(plan_id))
            .returning(move |user_id, plan_id| {
                let subscription = sample_subscription(user_id, plan_id);
                Box::pin(async move { Ok(Some(subscription)) })
            });

        let usecase = CheckoutUseCase::new(
            Arc::new(user_repo),
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(stripe),
        );

        let form = CreateCheckoutSessionForm {
            product_id: "plan_pro".to_string(),
            payment_mode: PaymentMode::Subscription,
            quantity: None,
        };

        let err = usecase
            .create_checkout_session(user_id, form)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::SubscriptionExists));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn credit_purchase_without_quantity_is_rejected() {
        let usecase = CheckoutUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockPlanRepository::new()),
            Arc::new(MockUserSubscriptionRepository::new()),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .create_checkout_session(Uuid::new_v4(), credit_purchase_form(None))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidQuantity));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_active_by_product_ref()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = CheckoutUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(plan_repo),
            Arc::new(MockUserSubscriptionRepository::new()),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .create_checkout_session(Uuid::new_v4(), credit_purchase_form(Some(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::ProductNotFound));
    }

    #[tokio::test]
    async fn subscription_checkout_creates_customer_and_persists_mapping() {
        let user_id = Uuid::new_v4();
        let plan = sample_plan("plan_pro", 1900);

        let mut user_repo = MockUserRepository::new();
        let mut plan_repo = MockPlanRepository::new();
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        let mut stripe = MockStripeGateway::new();

        plan_repo
            .expect_find_active_by_product_ref()
            .returning(move |_| {
                let plan = plan.clone();
                Box::pin(async move { Ok(Some(plan)) })
            });

        let user = sample_user(user_id, None);
        user_repo
            .expect_find_by_id()
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(Some(user)) })
            });

        subscription_repo
            .expect_find_active_like_by_user_and_plan()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        stripe
            .expect_find_customer_by_email()
            .with(eq("alice@example.com"))
            .returning(|_| Ok(None));
        stripe
            .expect_create_customer()
            .with(eq("alice@example.com"), eq(user_id))
            .returning(|_, _| Ok("cus_new".to_string()));

        user_repo
            .expect_set_stripe_customer_id()
            .with(eq(user_id), eq("cus_new"))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        stripe
            .expect_create_checkout_session()
            .withf(|_, mode, customer, quantity, metadata| {
                mode == "subscription"
                    && customer.as_deref() == Some("cus_new")
                    && *quantity == 1
                    && metadata.get("type").map(String::as_str) == Some("subscription_purchase")
            })
            .returning(|_, _, _, _, _| {
                Ok(CheckoutSessionCreated {
                    id: "cs_test_2".to_string(),
                    url: "https://checkout.stripe.com/c/cs_test_2".to_string(),
                })
            });

        let usecase = CheckoutUseCase::new(
            Arc::new(user_repo),
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(stripe),
        );

        let form = CreateCheckoutSessionForm {
            product_id: "plan_pro".to_string(),
            payment_mode: PaymentMode::Subscription,
            quantity: None,
        };

        let dto = usecase
            .create_checkout_session(user_id, form)
            .await
            .unwrap();

        assert_eq!(dto.session_id, "cs_test_2");
    }
}
