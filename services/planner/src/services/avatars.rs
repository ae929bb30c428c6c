//! services/planner/src/services/avatars.rs
//!
//! Profile pictures: upload the cropped image to the CDN and remember the
//! resulting URL on the user's profile.

use bytes::Bytes;
use planner_core::{ImageCdn, UploadOptions};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::services::users::{ProfilePatch, UserService};

const AVATAR_FOLDER: &str = "avatar";

/// CDN public id of a user's avatar: `{user_id}_{email}` with the `@` and the
/// first `.` of the email made path safe.
pub fn avatar_public_id(user_id: &str, email: &str) -> String {
    let email = email.replacen('@', "_at_", 1).replacen('.', "_", 1);
    format!("{}_{}", user_id, email)
}

#[derive(Clone)]
pub struct AvatarService {
    cdn: Arc<dyn ImageCdn>,
    users: UserService,
    cloud_name: String,
}

impl AvatarService {
    pub fn new(cdn: Arc<dyn ImageCdn>, users: UserService, cloud_name: String) -> Self {
        Self {
            cdn,
            users,
            cloud_name,
        }
    }

    /// Uploads the image and stores its secure URL as the profile's avatar.
    pub async fn upload_avatar(&self, user_id: &str, email: &str, image: Bytes) -> AppResult<String> {
        let options = UploadOptions {
            public_id: avatar_public_id(user_id, email),
            folder: AVATAR_FOLDER.to_string(),
            format: "jpg".to_string(),
            quality: "auto".to_string(),
        };
        let uploaded = self.cdn.upload(image, &options).await?;

        self.users
            .update_user_info(
                user_id,
                ProfilePatch {
                    avatar_url: Some(uploaded.secure_url.clone()),
                    ..ProfilePatch::default()
                },
            )
            .await?;
        info!("Avatar of user {} set to {}", user_id, uploaded.secure_url);
        Ok(uploaded.secure_url)
    }

    /// Delivery URL of the avatar, cropped to 150x150.
    pub fn avatar_url(&self, user_id: &str, email: &str) -> String {
        format!(
            "https://res.cloudinary.com/{}/image/upload/f_auto,q_auto,w_150,h_150,c_fill/{}/{}",
            self.cloud_name,
            AVATAR_FOLDER,
            avatar_public_id(user_id, email)
        )
    }

    /// Whether the avatar's delivery URL resolves. Any CDN failure counts as
    /// "no avatar".
    pub async fn avatar_exists(&self, user_id: &str, email: &str) -> bool {
        let url = self.avatar_url(user_id, email);
        match self.cdn.exists(&url).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Could not check avatar at {}: {}", url, e);
                false
            }
        }
    }

    /// Asks the CDN to remove the avatar. The CDN adapter only logs this, as
    /// deletion needs a signed request.
    pub async fn delete_avatar(&self, user_id: &str, email: &str) -> AppResult<()> {
        self.cdn.delete(&avatar_public_id(user_id, email)).await?;
        Ok(())
    }
}
