use std::path::Path;

use stencil_image::{Image, ImageError, ImageSize};
use stencil_imgproc::{
    color::rgb_from_gray,
    draw::{draw_circle, draw_line},
    features::Keypoint,
};

use crate::error::ExportError;
use crate::orchestrator::FeatureImage;
use crate::outcome::MatchSet;

const KEYPOINT_COLOR: [u8; 3] = [0, 200, 0];
const KEYPOINT_RADIUS: i64 = 3;

const PALETTE: [[u8; 3]; 8] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
];

/// Color of the `index`-th match line.
pub fn match_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

/// File name of the artifact of a (template slot, target) pair.
///
/// The full target file name is kept, extension included, so that targets differing
/// only by extension do not overwrite each other. `target` must end in a file name,
/// as every discovered target does.
///
/// # Example
///
/// ```
/// use stencil_batch::render::artifact_name;
///
/// let name = artifact_name("archive/cat.png".as_ref(), 2, "jpg");
/// assert_eq!(name, "match_cat.png_sample2.jpg");
/// ```
pub fn artifact_name(target: &Path, slot: usize, extension: &str) -> String {
    debug_assert!(
        target.file_name().is_some(),
        "target {} has no file name",
        target.display()
    );
    let base = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("match_{base}_sample{slot}.{extension}")
}

fn blit(dst: &mut Image<u8, 3>, src: &Image<u8, 1>, x_offset: usize) -> Result<(), ImageError> {
    let mut rgb = Image::<u8, 3>::from_size_val(src.size(), 0)?;
    rgb_from_gray(src, &mut rgb)?;

    let dst_cols = dst.cols();
    let row_len = src.cols() * 3;
    for (y, src_row) in rgb.as_slice().chunks_exact(row_len).enumerate() {
        let start = (y * dst_cols + x_offset) * 3;
        dst.as_slice_mut()[start..start + row_len].copy_from_slice(src_row);
    }

    Ok(())
}

#[inline]
fn keypoint_position(keypoint: &Keypoint, x_offset: usize) -> (i64, i64) {
    (
        keypoint.x.round() as i64 + x_offset as i64,
        keypoint.y.round() as i64,
    )
}

/// Draw the template and the target side by side and connect the matched keypoints.
///
/// The template sits on the left, the target to its right; the composite is as tall as
/// the taller image and the uncovered area stays black. An empty match set yields the
/// composite without lines.
///
/// # Arguments
///
/// * `template` - The template image and its features, the query side of the matches.
/// * `target` - The target image and its features, the train side of the matches.
/// * `match_set` - The accepted matches of the pair.
/// * `draw_keypoints` - Also circle every detected keypoint of both images.
///
/// # Errors
///
/// Returns [`ImageError::InvalidParameter`] if a match refers to a keypoint that does not
/// exist.
pub fn render_matches(
    template: &FeatureImage,
    target: &FeatureImage,
    match_set: &MatchSet,
    draw_keypoints: bool,
) -> Result<Image<u8, 3>, ImageError> {
    let x_offset = template.image.width();
    let size = ImageSize {
        width: template.image.width() + target.image.width(),
        height: template.image.height().max(target.image.height()),
    };

    let mut canvas = Image::<u8, 3>::from_size_val(size, 0)?;
    blit(&mut canvas, &template.image, 0)?;
    blit(&mut canvas, &target.image, x_offset)?;

    if draw_keypoints {
        for kp in &template.features.keypoints {
            draw_circle(&mut canvas, keypoint_position(kp, 0), KEYPOINT_RADIUS, KEYPOINT_COLOR);
        }
        for kp in &target.features.keypoints {
            draw_circle(
                &mut canvas,
                keypoint_position(kp, x_offset),
                KEYPOINT_RADIUS,
                KEYPOINT_COLOR,
            );
        }
    }

    for (i, m) in match_set.matches.iter().enumerate() {
        let query = template.features.keypoints.get(m.query_idx).ok_or_else(|| {
            ImageError::InvalidParameter(format!(
                "template keypoint {} out of {}",
                m.query_idx,
                template.features.len()
            ))
        })?;
        let train = target.features.keypoints.get(m.train_idx).ok_or_else(|| {
            ImageError::InvalidParameter(format!(
                "target keypoint {} out of {}",
                m.train_idx,
                target.features.len()
            ))
        })?;

        let color = match_color(i);
        let p0 = keypoint_position(query, 0);
        let p1 = keypoint_position(train, x_offset);
        draw_circle(&mut canvas, p0, KEYPOINT_RADIUS, color);
        draw_circle(&mut canvas, p1, KEYPOINT_RADIUS, color);
        draw_line(&mut canvas, p0, p1, color, 1);
    }

    Ok(canvas)
}

/// Encode the artifact by the extension of `path`, overwriting any existing file.
pub fn export(artifact: &Image<u8, 3>, path: &Path) -> Result<(), ExportError> {
    stencil_io::functional::write_image_rgb8(path, artifact)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use stencil_imgproc::{
        features::{Features, DESCRIPTOR_SIZE},
        matching::Match,
    };

    fn keypoint(x: f32, y: f32) -> Keypoint {
        Keypoint {
            x,
            y,
            scale: 8.0,
            orientation: 0.0,
            response: 1.0,
            octave: 0,
        }
    }

    fn feature_image(
        width: usize,
        height: usize,
        value: u8,
        points: &[(f32, f32)],
    ) -> Result<FeatureImage, ImageError> {
        Ok(FeatureImage {
            image: Image::from_size_val([width, height].into(), value)?,
            features: Features {
                keypoints: points.iter().map(|&(x, y)| keypoint(x, y)).collect(),
                descriptors: vec![[0.0; DESCRIPTOR_SIZE]; points.len()],
            },
        })
    }

    fn match_set(matches: Vec<Match>) -> MatchSet {
        MatchSet {
            slot: 1,
            target: PathBuf::from("target.png"),
            matches,
        }
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name(Path::new("/data/archive/img_01.jpeg"), 3, "png"),
            "match_img_01.jpeg_sample3.png"
        );
        assert_eq!(
            artifact_name(Path::new("noext"), 1, "jpg"),
            "match_noext_sample1.jpg"
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "has no file name")]
    fn test_artifact_name_without_file_name() {
        artifact_name(Path::new("/"), 1, "jpg");
    }

    #[test]
    fn test_render_layout() -> Result<(), ImageError> {
        let template = feature_image(4, 3, 50, &[])?;
        let target = feature_image(5, 6, 200, &[])?;
        let canvas = render_matches(&template, &target, &match_set(vec![]), true)?;

        assert_eq!(canvas.size(), ImageSize { width: 9, height: 6 });
        // template on the left
        assert_eq!(canvas.get_pixel(0, 0, 0)?, 50);
        assert_eq!(canvas.get_pixel(3, 2, 2)?, 50);
        // below the shorter template stays black
        assert_eq!(canvas.get_pixel(1, 4, 0)?, 0);
        // target on the right
        assert_eq!(canvas.get_pixel(4, 0, 1)?, 200);
        assert_eq!(canvas.get_pixel(8, 5, 0)?, 200);
        Ok(())
    }

    #[test]
    fn test_render_match_line() -> Result<(), ImageError> {
        let template = feature_image(10, 10, 0, &[(2.0, 5.0)])?;
        let target = feature_image(10, 10, 0, &[(7.0, 5.0)])?;
        let matches = vec![Match {
            query_idx: 0,
            train_idx: 0,
            distance: 0.1,
        }];
        let canvas = render_matches(&template, &target, &match_set(matches), false)?;

        // a horizontal line joins (2, 5) and (17, 5)
        let color = match_color(0);
        for x in 2..=17 {
            for (c, &v) in color.iter().enumerate() {
                assert_eq!(canvas.get_pixel(x, 5, c)?, v);
            }
        }
        Ok(())
    }

    #[test]
    fn test_render_invalid_match() -> Result<(), ImageError> {
        let template = feature_image(4, 4, 0, &[(1.0, 1.0)])?;
        let target = feature_image(4, 4, 0, &[])?;
        let matches = vec![Match {
            query_idx: 0,
            train_idx: 3,
            distance: 0.0,
        }];
        let res = render_matches(&template, &target, &match_set(matches), false);
        assert!(matches!(res, Err(ImageError::InvalidParameter(_))));
        Ok(())
    }

    #[test]
    fn test_export() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let template = feature_image(8, 8, 30, &[(3.0, 3.0)])?;
        let target = feature_image(8, 8, 90, &[(4.0, 4.0)])?;
        let canvas = render_matches(&template, &target, &match_set(vec![]), true)?;

        let path = dir.path().join(artifact_name(Path::new("t.png"), 1, "png"));
        export(&canvas, &path)?;
        // overwritten silently
        export(&canvas, &path)?;
        assert!(path.is_file());

        let bad = dir.path().join("artifact.unknown");
        assert!(matches!(
            export(&canvas, &bad),
            Err(ExportError::Write(stencil_io::IoError::InvalidFileExtension(_)))
        ));
        Ok(())
    }
}
