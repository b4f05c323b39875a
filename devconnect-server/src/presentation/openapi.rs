use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::presentation::handlers::auth::{
    AuthResponseDto, AuthorizeUrlDto, LoginDto, RegisterDto, SetUsernameDto, UserDto,
};
use crate::presentation::handlers::comments::{CommentDto, CreateCommentDto};
use crate::presentation::handlers::media::{DeleteImageDto, UploadedImageDto};
use crate::presentation::handlers::notifications::{
    MarkReadDto, MarkedReadDto, NotificationDto, UnreadCountDto,
};
use crate::presentation::handlers::posts::{
    AuthorDto, CreatePostDto, FeedResponseDto, PostDto, ReactionsDto, TopicDto,
};
use crate::presentation::handlers::reactions::ToggleReactionDto;
use crate::presentation::handlers::users::{
    FollowCountsDto, FollowDto, FollowStatusDto, ProfileDto,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::handlers::auth::register,
        crate::presentation::handlers::auth::login,
        crate::presentation::handlers::auth::oauth_authorize,
        crate::presentation::handlers::auth::oauth_callback,
        crate::presentation::handlers::auth::me,
        crate::presentation::handlers::auth::set_username,
        crate::presentation::handlers::posts::feed,
        crate::presentation::handlers::posts::get_post,
        crate::presentation::handlers::posts::following_feed,
        crate::presentation::handlers::posts::user_posts,
        crate::presentation::handlers::posts::create_post,
        crate::presentation::handlers::posts::delete_post,
        crate::presentation::handlers::posts::list_topics,
        crate::presentation::handlers::comments::list_comments,
        crate::presentation::handlers::comments::create_comment,
        crate::presentation::handlers::reactions::toggle_reaction,
        crate::presentation::handlers::users::get_profile,
        crate::presentation::handlers::users::get_user,
        crate::presentation::handlers::users::follow_counts,
        crate::presentation::handlers::users::followed_users,
        crate::presentation::handlers::users::follow_status,
        crate::presentation::handlers::users::follow,
        crate::presentation::handlers::users::unfollow,
        crate::presentation::handlers::notifications::list_notifications,
        crate::presentation::handlers::notifications::unread_count,
        crate::presentation::handlers::notifications::mark_read,
        crate::presentation::handlers::notifications::mark_all_read,
        crate::presentation::handlers::media::upload_image,
        crate::presentation::handlers::media::delete_image
    ),
    components(
        schemas(
            RegisterDto,
            LoginDto,
            SetUsernameDto,
            AuthResponseDto,
            AuthorizeUrlDto,
            UserDto,
            AuthorDto,
            ReactionsDto,
            CreatePostDto,
            PostDto,
            FeedResponseDto,
            TopicDto,
            CreateCommentDto,
            CommentDto,
            ToggleReactionDto,
            ProfileDto,
            FollowCountsDto,
            FollowStatusDto,
            FollowDto,
            NotificationDto,
            MarkReadDto,
            MarkedReadDto,
            UnreadCountDto,
            UploadedImageDto,
            DeleteImageDto
        )
    ),
    tags(
        (name = "auth", description = "Password and OAuth sign-in, current user"),
        (name = "posts", description = "Posts, feeds and topics"),
        (name = "comments", description = "Threaded comments"),
        (name = "reactions", description = "Happy/sad reactions on posts"),
        (name = "users", description = "Profiles and follows"),
        (name = "notifications", description = "Notification inbox"),
        (name = "media", description = "Post image uploads")
    ),
    modifiers(&SecurityAddon)
)]
pub(crate) struct ApiDoc;

pub(crate) struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.take().unwrap_or_default();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        openapi.components = Some(components);
    }
}
