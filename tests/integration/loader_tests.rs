//! Stack loader integration tests.
//!
//! Tests verify:
//! - Page count and discovery order
//! - Exact sample values across byte orders and BigTIFF
//! - Failure handling: missing files, unsupported formats, truncated data
//! - Directory chain limits and loops

use tiff_stack::format::tiff::PageMetadata;
use tiff_stack::{
    load_image_stack, LoadOptions, MemoryRangeReader, PageBuffer, StackError, StackLoader,
};

use super::test_utils::{
    create_three_page_stack, pattern_samples, write_temp_tiff, ByteOrderType, TestPage,
    TiffBuilder,
};

fn samples(page: &PageBuffer) -> Vec<u16> {
    page.as_raw().clone()
}

fn load_bytes(data: Vec<u8>) -> Result<tiff_stack::ImageStack, StackError> {
    StackLoader::default().load_from_reader(MemoryRangeReader::new(data, "mem://test.tif"))
}

// =============================================================================
// Basic Loading
// =============================================================================

#[test]
fn test_three_page_constant_stack() {
    let file = write_temp_tiff(&create_three_page_stack());
    let (pages, count) = load_image_stack(file.path(), false);

    assert_eq!(count, 3);
    assert_eq!(pages.len(), 3);
    for (k, page) in pages.iter().enumerate() {
        assert_eq!(page.dimensions(), (4, 4));
        assert!(page.pixels().all(|p| p.0[0] == k as u16 * 1000));
    }
}

#[test]
fn test_pattern_values_are_exact() {
    let data = TiffBuilder::new()
        .add_page(TestPage::pattern(5, 3).with_rows_per_strip(2))
        .build();
    let file = write_temp_tiff(&data);
    let (pages, count) = load_image_stack(file.path(), false);

    assert_eq!(count, 1);
    assert_eq!(pages[0].width(), 5);
    assert_eq!(pages[0].height(), 3);
    assert_eq!(samples(&pages[0]), pattern_samples(5, 3));
    assert_eq!(pages[0].get_pixel(4, 2).0[0], 14);
}

#[test]
fn test_pattern_wraps_past_u16() {
    // 300 * 300 samples exceeds 65536, so the pattern wraps
    let data = TiffBuilder::new()
        .add_page(TestPage::pattern(300, 300).with_rows_per_strip(7))
        .build();
    let stack = load_bytes(data).unwrap();

    let page = &stack.pages()[0];
    assert_eq!(samples(page), pattern_samples(300, 300));
    assert_eq!(page.get_pixel(0, 219).0[0], ((219 * 300) % 65536) as u16);
    assert_eq!(page.get_pixel(299, 299).0[0], ((299 * 300 + 299) % 65536) as u16);
}

#[test]
fn test_pages_keep_discovery_order() {
    let data = TiffBuilder::new()
        .add_page(TestPage::constant(3, 2, 7))
        .add_page(TestPage::pattern(3, 2))
        .add_page(TestPage::constant(3, 2, 65535))
        .build();
    let stack = load_bytes(data).unwrap();

    assert_eq!(stack.len(), 3);
    assert_eq!(samples(&stack.pages()[0]), vec![7; 6]);
    assert_eq!(samples(&stack.pages()[1]), pattern_samples(3, 2));
    assert_eq!(samples(&stack.pages()[2]), vec![65535; 6]);
}

#[test]
fn test_loading_twice_gives_equal_stacks() {
    let file = write_temp_tiff(&create_three_page_stack());
    let (first, first_count) = load_image_stack(file.path(), false);
    let (second, second_count) = load_image_stack(file.path(), true);

    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
}

#[test]
fn test_buffers_are_independent() {
    let file = write_temp_tiff(&create_three_page_stack());
    let loader = StackLoader::default();

    let mut pages = loader.load(file.path()).into_pages();
    pages[1].put_pixel(0, 0, image::Luma([42]));

    let fresh = loader.load(file.path());
    assert_eq!(fresh.pages()[1].get_pixel(0, 0).0[0], 1000);
    assert_eq!(pages[0].get_pixel(0, 0).0[0], 0);
}

// =============================================================================
// Byte Order and BigTIFF
// =============================================================================

fn pattern_file(byte_order: ByteOrderType, bigtiff: bool) -> Vec<u8> {
    TiffBuilder::new()
        .with_byte_order(byte_order)
        .with_bigtiff(bigtiff)
        .add_page(TestPage::pattern(17, 9).with_rows_per_strip(4))
        .add_page(TestPage::constant(17, 9, 0xABCD))
        .build()
}

#[test]
fn test_byte_orders_and_bigtiff_decode_identically() {
    let reference = load_bytes(pattern_file(ByteOrderType::LittleEndian, false)).unwrap();
    assert_eq!(reference.len(), 2);
    assert_eq!(samples(&reference.pages()[0]), pattern_samples(17, 9));
    assert_eq!(samples(&reference.pages()[1]), vec![0xABCD; 17 * 9]);

    for (byte_order, bigtiff) in [
        (ByteOrderType::BigEndian, false),
        (ByteOrderType::LittleEndian, true),
        (ByteOrderType::BigEndian, true),
    ] {
        let stack = load_bytes(pattern_file(byte_order, bigtiff)).unwrap();
        assert_eq!(
            stack.pages(),
            reference.pages(),
            "{:?} bigtiff={}",
            byte_order,
            bigtiff
        );
    }
}

// =============================================================================
// Compressed Strips
// =============================================================================

const LZW: u16 = 5;
const DEFLATE: u16 = 8;
const PACKBITS: u16 = 32773;
const ADOBE_DEFLATE: u16 = 32946;

#[test]
fn test_packbits_page_values() {
    let page = TestPage::gray16(2, 2, vec![1000, 2000, 3000, 65535]).with_compression(PACKBITS);
    let data = TiffBuilder::new().add_page(page).build();

    let stack = load_bytes(data.clone()).unwrap();
    assert_eq!(samples(&stack.pages()[0]), vec![1000, 2000, 3000, 65535]);

    let file = write_temp_tiff(&data);
    let (pages, count) = load_image_stack(file.path(), false);
    assert_eq!(count, 1);
    assert_eq!(samples(&pages[0]), vec![1000, 2000, 3000, 65535]);
}

#[test]
fn test_compressed_stacks_decode_like_raw() {
    let cases = [
        (LZW, None),
        (LZW, Some(2)),
        (DEFLATE, None),
        (DEFLATE, Some(2)),
        (ADOBE_DEFLATE, Some(2)),
        (PACKBITS, None),
    ];

    for (compression, predictor) in cases {
        for byte_order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
            let mut page = TestPage::pattern(33, 13)
                .with_rows_per_strip(5)
                .with_compression(compression);
            if let Some(predictor) = predictor {
                page = page.with_predictor(predictor);
            }
            let data = TiffBuilder::new()
                .with_byte_order(byte_order)
                .add_page(page)
                .add_page(TestPage::constant(33, 13, 0xFEDC).with_compression(compression))
                .build();

            let stack = load_bytes(data).unwrap_or_else(|e| {
                panic!("compression {} {:?}: {}", compression, byte_order, e)
            });
            assert_eq!(stack.len(), 2);
            assert_eq!(samples(&stack.pages()[0]), pattern_samples(33, 13));
            assert_eq!(samples(&stack.pages()[1]), vec![0xFEDC; 33 * 13]);
        }
    }
}

#[test]
fn test_mixed_compression_stack() {
    let data = TiffBuilder::new()
        .with_bigtiff(true)
        .add_page(TestPage::constant(8, 8, 1))
        .add_page(TestPage::constant(8, 8, 2).with_compression(LZW))
        .add_page(TestPage::constant(8, 8, 3).with_compression(PACKBITS))
        .add_page(TestPage::constant(8, 8, 4).with_compression(DEFLATE).with_predictor(2))
        .build();

    let stack = load_bytes(data).unwrap();
    for (k, page) in stack.iter().enumerate() {
        assert!(page.pixels().all(|p| p.0[0] == k as u16 + 1), "page {}", k);
    }
    assert_eq!(stack.metadata().and_then(|m| m.compression), Some(1));
}

#[test]
fn test_truncated_compressed_strip_fails() {
    let mut page = TestPage::pattern(16, 16).with_compression(LZW);
    page.byte_count_override = Some(3);
    let data = TiffBuilder::new().add_page(page).build();

    let err = load_bytes(data).unwrap_err();
    assert!(matches!(err, StackError::Decode { page: 0, .. }), "{}", err);
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_first_page_metadata() {
    let mut page = TestPage::constant(4, 4, 0).with_page_number(0, 3);
    page.description = Some("dpc stack".to_string());
    let data = TiffBuilder::new()
        .add_page(page)
        .add_page(TestPage::constant(4, 4, 1))
        .build();
    let stack = load_bytes(data).unwrap();

    let meta: &PageMetadata = stack.metadata().unwrap();
    assert_eq!(meta.width, Some(4));
    assert_eq!(meta.height, Some(4));
    assert_eq!(meta.samples_per_pixel, Some(1));
    assert_eq!(meta.bits_per_sample, Some(16));
    assert_eq!(meta.sample_format, Some(1));
    assert_eq!(meta.photometric, Some(1));
    assert_eq!(meta.page_number, Some((0, 3)));
    assert_eq!(meta.planar_config, None);
    assert_eq!(meta.planar_config_or_default(), 1);
    assert_eq!(meta.description.as_deref(), Some("dpc stack"));
}

#[test]
fn test_missing_optional_tags_use_defaults() {
    let mut page = TestPage::pattern(6, 5).with_rows_per_strip(2);
    page.sample_format = None;
    page.photometric = None;
    page.compression = None;
    page.omit_byte_counts = true;
    let stack = load_bytes(TiffBuilder::new().add_page(page).build()).unwrap();

    assert_eq!(samples(&stack.pages()[0]), pattern_samples(6, 5));
    let meta = stack.metadata().unwrap();
    assert_eq!(meta.sample_format, None);
    assert_eq!(meta.compression_or_default(), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_nonexistent_path_gives_empty_stack() {
    let (pages, count) = load_image_stack("/definitely/not/here/stack.tif", false);
    assert!(pages.is_empty());
    assert_eq!(count, 0);

    let err = StackLoader::default()
        .try_load("/definitely/not/here/stack.tif")
        .unwrap_err();
    assert!(err.is_open_failure());
}

#[test]
fn test_non_tiff_file_gives_empty_stack() {
    let file = write_temp_tiff(b"GIF89a this is not a tiff file");
    let (pages, count) = load_image_stack(file.path(), false);
    assert!(pages.is_empty());
    assert_eq!(count, 0);
}

fn assert_unsupported(page: TestPage) {
    let data = TiffBuilder::new().add_page(page).build();
    let err = load_bytes(data.clone()).unwrap_err();
    assert!(
        matches!(err, StackError::UnsupportedFormat { .. }),
        "unexpected error: {}",
        err
    );

    let file = write_temp_tiff(&data);
    assert_eq!(load_image_stack(file.path(), false).1, 0);
}

#[test]
fn test_tiled_rejected() {
    let mut page = TestPage::constant(16, 16, 1);
    page.tiled = true;
    assert_unsupported(page);
}

#[test]
fn test_jpeg_compression_rejected() {
    assert_unsupported(TestPage::constant(4, 4, 1).with_compression(7));
}

#[test]
fn test_floating_point_predictor_rejected() {
    assert_unsupported(
        TestPage::constant(4, 4, 1)
            .with_compression(8)
            .with_predictor(3),
    );
}

#[test]
fn test_eight_bit_rejected() {
    let mut page = TestPage::constant(4, 4, 200);
    page.bits_per_sample = 8;
    assert_unsupported(page);
}

#[test]
fn test_rgb_rejected() {
    let mut page = TestPage::constant(2, 2, 1);
    page.samples = vec![1; 12];
    page.samples_per_pixel = 3;
    page.photometric = Some(2);
    assert_unsupported(page);
}

#[test]
fn test_missing_bits_per_sample_rejected() {
    let mut page = TestPage::constant(4, 4, 1);
    page.omit_bits_per_sample = true;
    assert_unsupported(page);
}

#[test]
fn test_later_page_format_checked() {
    let data = TiffBuilder::new()
        .add_page(TestPage::constant(4, 4, 0))
        .add_page(TestPage::constant(4, 4, 1).with_compression(7))
        .build();
    assert!(matches!(
        load_bytes(data).unwrap_err(),
        StackError::UnsupportedFormat { .. }
    ));
}

#[test]
fn test_geometry_mismatch() {
    let data = TiffBuilder::new()
        .add_page(TestPage::constant(4, 4, 0))
        .add_page(TestPage::constant(4, 4, 1))
        .add_page(TestPage::constant(8, 2, 2))
        .build();
    let err = load_bytes(data).unwrap_err();
    assert!(matches!(
        err,
        StackError::GeometryMismatch {
            page: 2,
            width: 4,
            height: 4,
            found_width: 8,
            found_height: 2,
            ..
        }
    ));
}

#[test]
fn test_truncated_strip_fails_whole_load() {
    let mut broken = TestPage::pattern(4, 4).with_rows_per_strip(2);
    broken.byte_count_override = Some(12);
    let data = TiffBuilder::new()
        .add_page(TestPage::constant(4, 4, 0))
        .add_page(broken)
        .build();

    let err = load_bytes(data.clone()).unwrap_err();
    assert!(matches!(err, StackError::Decode { page: 1, row: 1, .. }));

    let file = write_temp_tiff(&data);
    let (pages, count) = load_image_stack(file.path(), false);
    assert!(pages.is_empty());
    assert_eq!(count, 0);
}

#[test]
fn test_truncated_file_fails() {
    let mut data = create_three_page_stack();
    data.truncate(data.len() - 10);
    let err = load_bytes(data).unwrap_err();
    assert!(matches!(err, StackError::Decode { page: 2, .. }));
}

// =============================================================================
// Directory Chain
// =============================================================================

#[test]
fn test_directory_loop_terminates() {
    let data = TiffBuilder::new()
        .add_page(TestPage::constant(2, 2, 1))
        .add_page(TestPage::constant(2, 2, 2))
        .add_page(TestPage::constant(2, 2, 3))
        .with_directory_loop()
        .build();
    let stack = load_bytes(data).unwrap();
    assert_eq!(stack.len(), 3);
    assert_eq!(stack.pages()[2].get_pixel(1, 1).0[0], 3);
}

#[test]
fn test_max_pages_limit() {
    let mut builder = TiffBuilder::new();
    for k in 0..5 {
        builder = builder.add_page(TestPage::constant(2, 2, k));
    }
    let loader = StackLoader::new(LoadOptions {
        max_pages: 2,
        ..LoadOptions::default()
    });
    let stack = loader
        .load_from_reader(MemoryRangeReader::new(builder.build(), "mem://five"))
        .unwrap();
    assert_eq!(stack.len(), 2);
}

#[test]
fn test_small_cache_blocks_still_decode() {
    let data = TiffBuilder::new()
        .add_page(TestPage::pattern(40, 30).with_rows_per_strip(3))
        .add_page(TestPage::pattern(40, 30).with_rows_per_strip(30))
        .build();
    let loader = StackLoader::new(LoadOptions {
        block_size: 7,
        cache_blocks: 2,
        ..LoadOptions::default()
    });
    let stack = loader
        .load_from_reader(MemoryRangeReader::new(data, "mem://small-blocks"))
        .unwrap();
    assert_eq!(samples(&stack.pages()[0]), pattern_samples(40, 30));
    assert_eq!(samples(&stack.pages()[1]), pattern_samples(40, 30));
}
