use gallery_core::models::{Picture, PictureView, UserView};
use gallery_core::AppError;
use gallery_db::UserStore;
use std::collections::HashMap;

/// Join pictures with their owners' public profiles, loading each owner once.
pub async fn picture_views(
    users: &dyn UserStore,
    pictures: Vec<Picture>,
) -> Result<Vec<PictureView>, AppError> {
    let mut owner_ids: Vec<_> = pictures.iter().map(|p| p.user_id).collect();
    owner_ids.sort_unstable();
    owner_ids.dedup();

    let owners: HashMap<_, UserView> = users
        .get_by_ids(&owner_ids)
        .await?
        .iter()
        .map(|user| (user.id, UserView::from(user)))
        .collect();

    Ok(pictures
        .into_iter()
        .map(|picture| {
            let owner = owners.get(&picture.user_id).cloned();
            PictureView::from_picture(picture, owner)
        })
        .collect())
}
