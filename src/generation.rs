//! Advertisement generation: image analysis, listing text from the language
//! model, an image search when nothing was uploaded, then persistence.

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::clients::{Collaborators, ImageAnalysis, ImageSearchParams};
use crate::db::DynAdvertisementRepository;
use crate::error::{AppError, AppResult};
use crate::media::{MediaStorage, ADVERTISEMENT_UPLOAD_DIR};
use crate::models::{Advertisement, NewAdvertisement};

pub const LISTING_SYSTEM_INSTRUCTION: &str = r#"You write product listings for online marketplaces such as Shopify, Facebook Marketplace and Amazon. Every listing must be publishable on any of them without edits.

Specificity
- Pull every technical detail out of the seller's description.
- Vehicles: year, make, model, mileage, transmission, fuel type, accident history, modifications.
- Electronics: brand, model, storage, condition, included accessories.
- Furniture: dimensions, materials, style, condition, assembly requirements.
- Clothing: size, brand, material, condition, care instructions.
- Any other category: the details a buyer of that category checks first.

Structure (aim for 300-400 characters)
- Open with a keyword-rich title naming brand, model and the key feature.
- Put the critical details in the first 150 characters.
- Follow with the main features, then the specifications as short bullet points.
- Close with the condition and a call to action.

Style
- Clear, factual and concise. No filler adjectives or hype.
- Prefer numbers and specifications over subjective claims.
- Short paragraphs that read well on a phone. No excessive punctuation and no terms marketplaces prohibit.

Always state
- The exact condition, including any defects or issues.
- Original price, shipping or pickup details, and warranty or return terms when they are provided."#;

/// An uploaded image as received in the multipart body.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A validated generation request.
#[derive(Debug, Clone)]
pub struct AdvertRequest {
    pub ad_description: String,
    pub img_description: String,
    pub image: Option<UploadedImage>,
}

impl AdvertRequest {
    /// Both descriptions are mandatory; an empty string counts as missing.
    /// Whitespace-only text is passed through as given.
    pub fn new(
        ad_description: Option<String>,
        img_description: Option<String>,
        image: Option<UploadedImage>,
    ) -> AppResult<Self> {
        match (non_empty(ad_description), non_empty(img_description)) {
            (Some(ad_description), Some(img_description)) => Ok(Self {
                ad_description,
                img_description,
                image,
            }),
            _ => Err(AppError::BadRequest("Missing description".to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub fn build_prompt(
    ad_description: &str,
    img_description: &str,
    analysis: Option<&ImageAnalysis>,
) -> String {
    let mut prompt = format!(
        "Generate a marketplace-optimized product listing using these details:\n\
         Product Description: {}\n\
         Image Description: {}\n",
        ad_description, img_description
    );

    if let Some(analysis) = analysis {
        let _ = write!(
            prompt,
            "\nAdditional Context from Image Analysis:\n\
             - Detected Objects: {}\n\
             - Image Labels: {}\n\
             - Detected Text: {}\n",
            analysis.objects.join(", "),
            analysis.labels.join(", "),
            analysis.text.join(", "),
        );
    }

    prompt
}

#[derive(Clone)]
pub struct AdvertGenerator {
    collaborators: Collaborators,
    advertisements: DynAdvertisementRepository,
    media: MediaStorage,
}

impl AdvertGenerator {
    pub fn new(
        collaborators: Collaborators,
        advertisements: DynAdvertisementRepository,
        media: MediaStorage,
    ) -> Self {
        Self {
            collaborators,
            advertisements,
            media,
        }
    }

    /// Runs the whole pipeline. Whatever goes wrong past validation is
    /// reported as a server error and leaves nothing persisted.
    pub async fn generate(&self, request: AdvertRequest) -> AppResult<Advertisement> {
        self.run(request).await.map_err(|err| match err {
            AppError::BadRequest(msg) | AppError::NotFound(msg) => AppError::Internal(msg),
            other => other,
        })
    }

    async fn run(&self, request: AdvertRequest) -> AppResult<Advertisement> {
        let analysis = match &request.image {
            Some(image) => self.analyze(&image.bytes).await,
            None => None,
        };

        let prompt = build_prompt(
            &request.ad_description,
            &request.img_description,
            analysis.as_ref(),
        );
        let generated_content = self
            .collaborators
            .text
            .generate(&prompt, LISTING_SYSTEM_INSTRUCTION)
            .await?;

        if request.image.is_none() {
            // Results are not attached to the advertisement.
            let results = self
                .collaborators
                .search
                .search(&request.img_description, &ImageSearchParams::default())
                .await?;
            info!(count = results.len(), "Image search finished");
        }

        let stored_image = match &request.image {
            Some(image) => Some(
                self.media
                    .save(ADVERTISEMENT_UPLOAD_DIR, &image.file_name, &image.bytes)
                    .await?,
            ),
            None => None,
        };

        let new = NewAdvertisement {
            description: request.ad_description,
            image_description: request.img_description,
            generated_content,
            image: stored_image.clone(),
        };

        match self.advertisements.create(&new).await {
            Ok(ad) => {
                info!(id = ad.id, has_image = ad.image.is_some(), "Created advertisement");
                Ok(ad)
            }
            Err(err) => {
                if let Some(path) = stored_image {
                    if let Err(cleanup) = self.media.remove(&path).await {
                        warn!(path = %path, error = %cleanup, "Failed to remove orphaned upload");
                    }
                }
                Err(err)
            }
        }
    }

    /// Vision failures are logged and swallowed; generation continues without analysis.
    async fn analyze(&self, bytes: &[u8]) -> Option<ImageAnalysis> {
        match self.collaborators.vision.analyze(bytes).await {
            Ok(analysis) => Some(analysis),
            Err(err) => {
                warn!(error = %err, "Image analysis failed, continuing without it");
                None
            }
        }
    }
}
