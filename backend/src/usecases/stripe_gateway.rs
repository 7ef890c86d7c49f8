use async_trait::async_trait;
use crates::payments::stripe_client::{
    CheckoutSessionRequest, CreatedCheckoutSession, SignatureError, StripeApiError, StripeClient,
};

/// Seam over the Stripe HTTP client so use cases can be exercised without the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession, StripeApiError>;

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<(), SignatureError>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession, StripeApiError> {
        self.create_checkout_session(request).await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<(), SignatureError> {
        self.verify_webhook_signature(payload, signature)
    }
}
