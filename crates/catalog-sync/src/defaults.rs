//! Built-in style templates
//!
//! Served when the remote catalog is unreachable and no snapshot exists, and
//! written to an empty remote catalog on first run.

use remote_store::StyleTemplate;

/// (id, name, image, prompt, description)
const DEFAULTS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "1",
        "Royal Indian Wedding",
        "https://images.unsplash.com/photo-1583939003579-730e3918a45a?w=500&q=75",
        "A magnificent Indian wedding portrait. Traditional royal attire with intricate gold embroidery, heavy jewelry, and a palace background. Warm cinematic lighting.",
        "Traditional elegance.",
    ),
    (
        "2",
        "Cyberpunk Neon",
        "https://images.unsplash.com/photo-1550684848-fac1c5b4e853?w=500&q=75",
        "Cyberpunk 2077 style. Neon glowing accents, futuristic techwear, rainy night city background with teal and pink lighting. High-tech aesthetic.",
        "Futuristic sci-fi.",
    ),
    (
        "3",
        "Pixar Animation",
        "https://images.unsplash.com/photo-1534447677768-be436bb09401?w=500&q=75",
        "3D Disney Pixar animation style. Big expressive eyes, smooth skin textures, stylized features, vibrant and soft cinematic lighting.",
        "3D Animated character.",
    ),
    (
        "4",
        "Greek Marble Statue",
        "https://images.unsplash.com/photo-1549887534-1541e9326642?w=500&q=75",
        "Classic white marble Greek sculpture. Intricate carved details, smooth stone texture, museum gallery lighting, timeless museum aesthetic.",
        "Ancient masterpiece.",
    ),
    (
        "5",
        "Detailed Pencil Sketch",
        "https://images.unsplash.com/photo-1513364776144-60967b0f800f?w=500&q=75",
        "Hyper-realistic pencil charcoal sketch on textured paper. Fine lines, artistic shading, graphite smudges, hand-drawn look.",
        "Artistic hand-drawing.",
    ),
    (
        "6",
        "Van Gogh Oil Painting",
        "https://images.unsplash.com/photo-1579783902614-a3fb3927b6a5?w=500&q=75",
        "Impressionist oil painting in the style of Vincent van Gogh. Thick visible brushstrokes, swirling colors, Starry Night color palette.",
        "Classic impressionism.",
    ),
    (
        "7",
        "1950s Hollywood Noir",
        "https://images.unsplash.com/photo-1536440136628-849c177e76a1?w=500&q=75",
        "1950s Black and white film noir cinematography. High contrast, dramatic shadows, moody atmosphere, sharp focus, vintage cinematic look.",
        "Vintage movie star.",
    ),
    (
        "8",
        "GTA Loading Screen",
        "https://images.unsplash.com/photo-1563089145-599997674d42?w=500&q=75",
        "Stylized vector art loading screen style. Thick black outlines, high contrast saturated colors, digital illustration aesthetic.",
        "Comic-book stylized.",
    ),
    (
        "9",
        "Viking Chieftain",
        "https://images.unsplash.com/photo-1519074063912-ad2dbf50b16d?w=500&q=75",
        "Rough Viking era warrior. Fur clothing, tribal face paint, snowy dark forest background, cinematic cold lighting, epic historical look.",
        "Norse warrior.",
    ),
    (
        "10",
        "Studio Ghibli Anime",
        "https://images.unsplash.com/photo-1528360983277-13d401cdc186?w=500&q=75",
        "Hand-painted Studio Ghibli anime style. Soft watercolor textures, whimsical atmosphere, lush green background, gentle lighting.",
        "Japanese animation.",
    ),
];

/// The built-in catalog, densely indexed from 0 in display order.
pub fn default_styles() -> Vec<StyleTemplate> {
    DEFAULTS
        .iter()
        .enumerate()
        .map(|(position, (id, name, image_url, prompt, description))| StyleTemplate {
            id: id.to_string(),
            name: name.to_string(),
            prompt: prompt.to_string(),
            description: description.to_string(),
            image_url: image_url.to_string(),
            position_index: Some(position as i64),
            auto_apply: false,
            created_at: None,
        })
        .collect()
}
