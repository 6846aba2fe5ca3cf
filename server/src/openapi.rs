use utoipa::OpenApi;

use crate::{routes, schema};

#[derive(OpenApi)]
#[openapi(
    paths(routes::media::get_media, routes::media::post_media),
    components(schemas(
        schema::MediaRecord,
        schema::SourceKind,
        schema::RemoteMediaRequest,
        schema::UploadForm,
        schema::ErrorBody,
    )),
    tags((name = "reelbin"))
)]
pub struct ApiDoc;

#[test]
fn document_lists_media_routes() {
    let doc = ApiDoc::openapi();
    let media = doc.paths.paths.get("/media").expect("/media is documented");
    assert_eq!(media.operations.len(), 2);
}
