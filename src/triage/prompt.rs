//! Classification prompt and response schema.
//!
//! One prompt per thread, built from the newest message only. The category
//! definitions double as the model's instructions, so changes here change
//! classification behavior.

use serde_json::{Value, json};

use crate::mailbox::EmailMessage;
use crate::triage::types::Category;

const INSTRUCTIONS: &str = r#"You are a helpful assistant in managing my emails by classifying/identifying emails. In the following conversations, I will only send you the email's head information and body in plain text. You will reply to me with a JSON object in this schema of TypeScript:

```typescript
{
  category?: "Receipts" | "Notices" | "Notices/OTP" | "Notices/Status" | "Feeds" | "Promotions" | "Others";
  time_sensitive: boolean;
  machine_generated: boolean;
  action_required: boolean;
}
```

- `category`: You categorize my email into one of these categories:
  - `Receipts`: Mostly machine-generated documents, such as paper trails, transactional receipts, bank statements (except notification of statements), and so on, should be archived for a long time.
  - `Notices`: This is a machine-generated email to notify me (or my group) of an event or a time-sensitive email that is unimportant or urgent enough for me to pay much attention to, such as social media updates, security alerts, or the results of something. The email is not helpful and is supposed to be deleted after 30/60 days.
  - `Notices/OTP`: This is a subcategory of `Notices`. Especially to verify my email address, containing several digital numbers or combined with short strings. It's time-sensitive. The email is not helpful and should be deleted after I proceed with it.
  - `Notices/Status`: This is a subcategory of `Notices`. Especially to inform me of the status of an online order, shipment and parcel tracking, an App in Google Play / App Store, or a website.
  - `Feeds`: This is an informational email worth reading, maybe my subscription, such as news, school newsletters, e-magazines, articles, and weekly/monthly reports (except machine-generated ones), not including marketing emails for promotion.
  - `Promotions`: This email is a marketing message that may be promotional, bulk, or commercial. It is possible that this email could be classified as spam.
  - `Others`: Any other email you cannot put into the categories above.
- `time_sensitive`: If the email is urgently, or need to be notified or replied immediately, set `time_sensitive` to `true`; otherwise, set it to `false`.
- `machine_generated`: If the email is machine-generated, set `machine_generated` to `true`; else, if you think the email was authored by a natural person, set it to `false`.
- `action_required`: If you think the email requires an action from me, set `action_required` to `true`; otherwise, set it to `false`.

Reply to me with the JSON object in the schema of TypeScript."#;

/// Build the classification prompt for one message. The plain body is
/// truncated to `body_limit` characters to stay inside request limits.
pub fn build_prompt(message: &EmailMessage, body_limit: usize) -> String {
    let body: String = message.body.chars().take(body_limit).collect();
    format!(
        "{INSTRUCTIONS}\n\n\
         ----BEGIN OF EMAIL HEADERS----\n\
         Date: {}\n\
         From: {}\n\
         To: {}\n\
         Subject: {}\n\
         ----END OF EMAIL HEADERS----\n\
         ----BEGIN OF EMAIL PLAIN BODY----\n\
         {}\n\
         ----END OF EMAIL PLAIN BODY----",
        message.timestamp.to_rfc2822(),
        message.from,
        message.to.join(", "),
        message.subject,
        body,
    )
}

/// JSON schema for the structured-output response format. `category` is a
/// closed enum and extra properties are rejected, mirroring the serde-side
/// validation in [`ClassificationResult`](crate::triage::types::ClassificationResult).
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": {
                "type": "string",
                "description": "The category of the email",
                "enum": Category::WIRE_NAMES,
            },
            "time_sensitive": {
                "type": "boolean",
                "description": "Whether the email is time-sensitive to be replied immediately.",
            },
            "machine_generated": {
                "type": "boolean",
                "description": "Whether the email is machine-generated.",
            },
            "action_required": {
                "type": "boolean",
                "description": "Whether the email requires an action from me.",
            },
        },
        "required": ["category", "machine_generated", "time_sensitive", "action_required"],
        "additionalProperties": false,
    })
}
