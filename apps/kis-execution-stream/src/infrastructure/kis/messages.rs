//! KIS Stream Message Types
//!
//! Wire format for the subscription handshake.
//!
//! # Subscription request
//!
//! ```json
//! {"header":{"approval_key":"...","custtype":"P","tr_type":"1","content-type":"utf-8"},
//!  "body":{"input":{"tr_id":"H0STCNI0","tr_key":"hts-id"}}}
//! ```
//!
//! # Subscription ack
//!
//! ```json
//! {"header":{"tr_id":"H0STCNI0","tr_key":"hts-id","encrypt":"N"},
//!  "body":{"rt_cd":"0","msg_cd":"OPSP0000","msg1":"SUBSCRIBE SUCCESS",
//!          "output":{"iv":"...","key":"..."}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::credential::ApprovalKey;
use crate::domain::stream::StreamSubscription;

/// Customer type tag for individual accounts.
pub const CUSTOMER_TYPE_PERSONAL: &str = "P";

/// Registration type tag meaning "subscribe".
pub const TR_TYPE_SUBSCRIBE: &str = "1";

/// Content type tag.
pub const CONTENT_TYPE_UTF8: &str = "utf-8";

/// `rt_cd` value of a successful ack.
pub const ACK_SUCCESS: &str = "0";

// =============================================================================
// Request
// =============================================================================

/// Subscription request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionHeader {
    /// Current approval key.
    pub approval_key: String,
    /// Customer type tag.
    pub custtype: String,
    /// Registration type tag.
    pub tr_type: String,
    /// Content type tag.
    #[serde(rename = "content-type")]
    pub content_type: String,
}

/// Stream selector inside the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInput {
    /// Stream identifier.
    pub tr_id: String,
    /// Subscriber key.
    pub tr_key: String,
}

/// Subscription request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionBody {
    /// Stream selector.
    pub input: SubscriptionInput,
}

/// A complete subscription request for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Request header.
    pub header: SubscriptionHeader,
    /// Request body.
    pub body: SubscriptionBody,
}

impl SubscriptionRequest {
    /// Build a subscribe request for `subscription` using `approval_key`.
    #[must_use]
    pub fn subscribe(approval_key: &ApprovalKey, subscription: &StreamSubscription) -> Self {
        Self {
            header: SubscriptionHeader {
                approval_key: approval_key.expose().to_string(),
                custtype: CUSTOMER_TYPE_PERSONAL.to_string(),
                tr_type: TR_TYPE_SUBSCRIBE.to_string(),
                content_type: CONTENT_TYPE_UTF8.to_string(),
            },
            body: SubscriptionBody {
                input: SubscriptionInput {
                    tr_id: subscription.stream_id.clone(),
                    tr_key: subscription.subscriber_key.clone(),
                },
            },
        }
    }

    /// Serialize to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Ack
// =============================================================================

/// Ack header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckHeader {
    /// Stream identifier the ack refers to.
    #[serde(default)]
    pub tr_id: String,
    /// Subscriber key echoed back.
    #[serde(default)]
    pub tr_key: Option<String>,
    /// Encryption flag.
    #[serde(default)]
    pub encrypt: Option<String>,
}

/// Decryption material handed back in a successful ack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckOutput {
    /// AES key (raw characters are the key bytes).
    #[serde(default)]
    pub key: Option<String>,
    /// AES IV (raw characters are the IV bytes).
    #[serde(default)]
    pub iv: Option<String>,
}

/// Ack body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckBody {
    /// Status code; `"0"` is success.
    #[serde(default)]
    pub rt_cd: String,
    /// Message code.
    #[serde(default)]
    pub msg_cd: String,
    /// Message text.
    #[serde(default)]
    pub msg1: String,
    /// Decryption material.
    #[serde(default)]
    pub output: Option<AckOutput>,
}

/// The single response frame read after a subscription request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAck {
    /// Ack header.
    #[serde(default)]
    pub header: AckHeader,
    /// Ack body.
    #[serde(default)]
    pub body: AckBody,
}

impl SubscriptionAck {
    /// Parse an ack frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Check the success sentinel.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.body.rt_cd.trim() == ACK_SUCCESS
    }

    /// Key and IV, when both are present and non-empty.
    #[must_use]
    pub fn key_iv(&self) -> Option<(&str, &str)> {
        let output = self.body.output.as_ref()?;
        let key = output.key.as_deref().filter(|k| !k.is_empty())?;
        let iv = output.iv.as_deref().filter(|iv| !iv.is_empty())?;
        Some((key, iv))
    }
}
