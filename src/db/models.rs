use serde::Serialize;

/// Database row shapes. The client-facing views below control what is
/// serialized; `password_hash` never leaves this module's row structs.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub is_vet: bool,
    pub image_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub image_name: String,
    pub created_at: String,
}

/// Wire shape for the authenticated user and registration responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub username: String,
    pub is_vet: bool,
    pub image_name: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            is_vet: user.is_vet,
            image_name: user.image_name,
        }
    }
}

/// Owner identity embedded in post and comment views so the client
/// renders without a second lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub image_name: String,
    pub is_vet: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub image_name: String,
    pub owner: OwnerView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub post_id: String,
    pub comment: String,
    pub is_owner_vet: bool,
    pub owner: OwnerView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_view_uses_wire_names_and_hides_hash() {
        let view = UserView::from(User {
            id: "u1".into(),
            email: "a@b.c".into(),
            username: "alice".into(),
            password_hash: "$2b$...".into(),
            is_vet: true,
            image_name: "u1.jpg".into(),
            created_at: "2024-01-01".into(),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["_id"], "u1");
        assert_eq!(json["isVet"], true);
        assert_eq!(json["imageName"], "u1.jpg");
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert!(!keys.iter().any(|k| k.contains("password")));
    }

    #[test]
    fn post_view_embeds_owner() {
        let view = PostView {
            id: "p1".into(),
            title: "Case 1".into(),
            content: "".into(),
            image_name: "".into(),
            owner: OwnerView {
                id: "u1".into(),
                username: "alice".into(),
                image_name: "".into(),
                is_vet: false,
            },
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["_id"], "p1");
        assert_eq!(json["owner"]["_id"], "u1");
        assert_eq!(json["owner"]["username"], "alice");
    }

    #[test]
    fn comment_view_uses_wire_names() {
        let view = CommentView {
            id: "c1".into(),
            post_id: "p1".into(),
            comment: "Nice case".into(),
            is_owner_vet: true,
            owner: OwnerView {
                id: "u2".into(),
                username: "bob".into(),
                image_name: "".into(),
                is_vet: true,
            },
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["postId"], "p1");
        assert_eq!(json["isOwnerVet"], true);
    }
}
