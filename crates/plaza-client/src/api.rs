//! REST client.
//!
//! [`Api`] is the request/response surface the views and the messenger use.
//! [`HttpApi`] implements it over reqwest; tests substitute an in-memory
//! implementation.

use async_trait::async_trait;
use plaza_proto::{
    ChatId, ChatSummary, Comment, Endpoint, Member, MessageId, Method, NotificationId, PostId,
    StoryId, StoryUser, UserId, UserSummary,
    rest::{
        ChatListBody, CommentList, CommentResponse, CreateChat, CreateChatResponse, ErrorBody,
        FeedPage, FriendList, FriendRequestAction, LikeResponse, MarkNotificationsRead,
        MemberList, MemberTarget, MessagePage, MessageResponse, NewComment, NotificationPage,
        ProfilePage, SendMessageBody, SessionInfo, StoryFeed, SuccessResponse, UnreadCount,
    },
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    config::ClientConfig,
    error::{ApiError, ConfigError},
};

/// Header carrying the session proof on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// REST operations consumed by the client.
#[async_trait]
pub trait Api: Send + Sync {
    /// `GET /api/feed?page=N[&check_new=true]`
    async fn feed(&self, page: u32, check_new: bool) -> Result<FeedPage, ApiError>;

    /// `POST /api/post/:id/like`
    async fn toggle_like(&self, post_id: PostId) -> Result<LikeResponse, ApiError>;

    /// `GET /api/post/:id/comments`
    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError>;

    /// `POST /api/post/:id/comment`
    async fn add_comment(&self, post_id: PostId, content: &str) -> Result<Comment, ApiError>;

    /// `POST /api/post/:id/delete`
    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError>;

    /// `GET /api/chats`
    async fn chats(&self) -> Result<Vec<ChatSummary>, ApiError>;

    /// `GET /api/chat/:id/messages?page=N`
    async fn messages(&self, chat_id: ChatId, page: u32) -> Result<MessagePage, ApiError>;

    /// `POST /api/chat/:id/send`
    async fn send_message(
        &self,
        chat_id: ChatId,
        body: &SendMessageBody,
    ) -> Result<MessageResponse, ApiError>;

    /// `POST /api/chat/message/:id/delete`
    async fn delete_message(&self, message_id: MessageId) -> Result<MessageResponse, ApiError>;

    /// `POST /api/chat/:id/read`
    async fn mark_chat_read(&self, chat_id: ChatId) -> Result<(), ApiError>;

    /// `GET /api/chat/:id/members`
    async fn members(&self, chat_id: ChatId) -> Result<Vec<Member>, ApiError>;

    /// `POST /api/chat/:id/make_admin`
    async fn make_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError>;

    /// `POST /api/chat/:id/remove_member`
    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError>;

    /// `POST /api/chat/create`
    async fn create_chat(&self, request: &CreateChat) -> Result<ChatSummary, ApiError>;

    /// `GET /api/friends?search=Q`
    async fn friends(&self, search: Option<&str>) -> Result<Vec<UserSummary>, ApiError>;

    /// `GET /api/profile/:username?page=N`
    async fn profile(&self, username: &str, page: u32) -> Result<ProfilePage, ApiError>;

    /// `POST /api/friend_request/:username[/accept|/decline|/cancel]`
    async fn friend_request(
        &self,
        username: &str,
        action: FriendRequestAction,
    ) -> Result<(), ApiError>;

    /// `POST /api/friend/:username/remove`
    async fn remove_friend(&self, username: &str) -> Result<(), ApiError>;

    /// `POST /api/follow/:username`
    async fn follow(&self, username: &str) -> Result<(), ApiError>;

    /// `POST /api/unfollow/:username`
    async fn unfollow(&self, username: &str) -> Result<(), ApiError>;

    /// `GET /api/stories`
    async fn stories(&self) -> Result<Vec<StoryUser>, ApiError>;

    /// `POST /api/story/:id/view`
    async fn view_story(&self, story_id: StoryId) -> Result<(), ApiError>;

    /// `GET /api/notifications?page=N`
    async fn notifications(&self, page: u32) -> Result<NotificationPage, ApiError>;

    /// `POST /api/notifications/mark_read`
    async fn mark_notifications_read(
        &self,
        ids: &[NotificationId],
    ) -> Result<UnreadCount, ApiError>;

    /// `GET /api/notifications/unread_count`
    async fn unread_count(&self) -> Result<UnreadCount, ApiError>;

    /// `GET /auth/api/me`
    async fn me(&self) -> Result<SessionInfo, ApiError>;
}

/// [`Api`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base: Url,
}

impl HttpApi {
    /// Client for the configured server.
    ///
    /// `csrf_token`, when present, is sent on every request.
    pub fn new(config: &ClientConfig, csrf_token: Option<&str>) -> Result<Self, ConfigError> {
        let base = config.base()?;
        let mut headers = HeaderMap::new();
        if let Some(token) = csrf_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| ConfigError::InvalidToken(e.to_string()))?;
            headers.insert(CSRF_HEADER, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { http, base })
    }

    /// Absolute URL of an endpoint, with user-supplied segments encoded.
    pub fn url(&self, endpoint: &Endpoint) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Network(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(endpoint.segments());
        let query = endpoint.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn call<B, T>(&self, endpoint: Endpoint, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(&endpoint)?;
        let mut request = match endpoint.method() {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%endpoint, "request");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.reason().map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            tracing::debug!(%endpoint, status = status.as_u16(), %message, "request rejected");
            return Err(ApiError::Status { status: status.as_u16(), message });
        }
        response.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<T, ApiError> {
        self.call::<(), T>(endpoint, None).await
    }

    async fn post<B, T>(&self, endpoint: Endpoint, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.call(endpoint, Some(body)).await
    }

    /// POST without a body whose response is `{success, error?}`.
    async fn mutate(&self, endpoint: Endpoint) -> Result<(), ApiError> {
        let response: SuccessResponse = self.call::<(), _>(endpoint, None).await?;
        ensure_success(response)
    }
}

/// Turn `{success: false, error}` into [`ApiError::Rejected`].
pub fn ensure_success(response: SuccessResponse) -> Result<(), ApiError> {
    if response.success {
        return Ok(());
    }
    let reason = response.error.or(response.message).unwrap_or_else(|| "request failed".into());
    Err(ApiError::Rejected(reason))
}

#[async_trait]
impl Api for HttpApi {
    async fn feed(&self, page: u32, check_new: bool) -> Result<FeedPage, ApiError> {
        self.get(Endpoint::Feed { page, check_new }).await
    }

    async fn toggle_like(&self, post_id: PostId) -> Result<LikeResponse, ApiError> {
        let response: LikeResponse = self.call::<(), _>(Endpoint::LikePost(post_id), None).await?;
        if !response.success {
            return Err(ApiError::Rejected("like failed".into()));
        }
        Ok(response)
    }

    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        let list: CommentList = self.get(Endpoint::PostComments(post_id)).await?;
        Ok(list.comments)
    }

    async fn add_comment(&self, post_id: PostId, content: &str) -> Result<Comment, ApiError> {
        let body = NewComment { content: content.to_string() };
        let response: CommentResponse = self.post(Endpoint::CommentOnPost(post_id), &body).await?;
        if !response.success {
            return Err(ApiError::Rejected("comment failed".into()));
        }
        Ok(response.comment)
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        self.mutate(Endpoint::DeletePost(post_id)).await
    }

    async fn chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        let body: ChatListBody = self.get(Endpoint::Chats).await?;
        Ok(body.into_chats())
    }

    async fn messages(&self, chat_id: ChatId, page: u32) -> Result<MessagePage, ApiError> {
        self.get(Endpoint::ChatMessages { chat_id, page }).await
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        body: &SendMessageBody,
    ) -> Result<MessageResponse, ApiError> {
        self.post(Endpoint::SendMessage(chat_id), body).await
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<MessageResponse, ApiError> {
        self.call::<(), _>(Endpoint::DeleteMessage(message_id), None).await
    }

    async fn mark_chat_read(&self, chat_id: ChatId) -> Result<(), ApiError> {
        self.mutate(Endpoint::MarkChatRead(chat_id)).await
    }

    async fn members(&self, chat_id: ChatId) -> Result<Vec<Member>, ApiError> {
        let list: MemberList = self.get(Endpoint::ChatMembers(chat_id)).await?;
        Ok(list.members)
    }

    async fn make_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
        let response = self.post(Endpoint::MakeAdmin(chat_id), &MemberTarget { user_id }).await?;
        ensure_success(response)
    }

    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
        let response =
            self.post(Endpoint::RemoveMember(chat_id), &MemberTarget { user_id }).await?;
        ensure_success(response)
    }

    async fn create_chat(&self, request: &CreateChat) -> Result<ChatSummary, ApiError> {
        let response: CreateChatResponse = self.post(Endpoint::CreateChat, request).await?;
        match (response.success, response.chat) {
            (true, Some(chat)) => Ok(chat),
            (true, None) => Err(ApiError::Decode("created chat missing from response".into())),
            (false, _) => {
                Err(ApiError::Rejected(response.error.unwrap_or_else(|| "could not create chat".into())))
            },
        }
    }

    async fn friends(&self, search: Option<&str>) -> Result<Vec<UserSummary>, ApiError> {
        let list: FriendList =
            self.get(Endpoint::Friends { search: search.map(str::to_string) }).await?;
        Ok(list.friends)
    }

    async fn profile(&self, username: &str, page: u32) -> Result<ProfilePage, ApiError> {
        self.get(Endpoint::Profile { username: username.to_string(), page }).await
    }

    async fn friend_request(
        &self,
        username: &str,
        action: FriendRequestAction,
    ) -> Result<(), ApiError> {
        self.mutate(Endpoint::FriendRequest { username: username.to_string(), action }).await
    }

    async fn remove_friend(&self, username: &str) -> Result<(), ApiError> {
        self.mutate(Endpoint::RemoveFriend(username.to_string())).await
    }

    async fn follow(&self, username: &str) -> Result<(), ApiError> {
        self.mutate(Endpoint::Follow(username.to_string())).await
    }

    async fn unfollow(&self, username: &str) -> Result<(), ApiError> {
        self.mutate(Endpoint::Unfollow(username.to_string())).await
    }

    async fn stories(&self) -> Result<Vec<StoryUser>, ApiError> {
        let feed: StoryFeed = self.get(Endpoint::Stories).await?;
        Ok(feed.story_users)
    }

    async fn view_story(&self, story_id: StoryId) -> Result<(), ApiError> {
        self.mutate(Endpoint::ViewStory(story_id)).await
    }

    async fn notifications(&self, page: u32) -> Result<NotificationPage, ApiError> {
        self.get(Endpoint::Notifications { page }).await
    }

    async fn mark_notifications_read(
        &self,
        ids: &[NotificationId],
    ) -> Result<UnreadCount, ApiError> {
        let body = MarkNotificationsRead { notification_ids: ids.to_vec() };
        self.post(Endpoint::MarkNotificationsRead, &body).await
    }

    async fn unread_count(&self) -> Result<UnreadCount, ApiError> {
        self.get(Endpoint::UnreadCount).await
    }

    async fn me(&self) -> Result<SessionInfo, ApiError> {
        self.get(Endpoint::Me).await
    }
}
