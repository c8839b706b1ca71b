use super::*;

const PRODUCT_PAGE: &str = r#"
    <html>
        <body>
            <nav class="woocommerce-breadcrumb">
                <a href="/">Accueil</a>
                <a href="/boutique/">Boutique</a>
                <a href="/c/audio/">Audio</a>
                <a href="/c/audio/casques/">Casques  Sans fil</a>
            </nav>
            <div class="woocommerce-product-gallery__wrapper">
                <img src="/wp-content/uploads/casque-1.jpg">
                <img src="/wp-content/uploads/casque-2.jpg">
                <img src="/wp-content/uploads/casque-1.jpg">
                <img src="">
            </div>
            <h1>
                Casque   Bluetooth JBL
            </h1>
            <span class="onsale">-20%</span>
            <p class="price">
                <del><bdi>25 000 FCFA</bdi></del>
                <ins><bdi>19 900 FCFA</bdi></ins>
            </p>
            <div class="electro-description">
                <p>Autonomie 30h.</p>
                <ul><li>Bluetooth 5.0</li><li>Micro intégré</li></ul>
            </div>
            <div class="product_meta">
                <span class="posted_in"><a href="/c/audio/">Audio</a>, <a href="/c/promo/">Promo</a></span>
            </div>
        </body>
    </html>
"#;

#[test]
fn extract_full_product_page() {
    let product = extract_product(PRODUCT_PAGE);

    assert_eq!(product.name, "Casque Bluetooth JBL");
    assert_eq!(product.price_before.as_deref(), Some("25 000 FCFA"));
    assert_eq!(product.price_after.as_deref(), Some("19 900 FCFA"));
    assert_eq!(product.discount.as_deref(), Some("-20%"));
    assert_eq!(product.category.as_deref(), Some("Audio"));
    assert_eq!(product.sub_category.as_deref(), Some("Casques Sans fil"));
    assert_eq!(
        product.description.as_deref(),
        Some("Autonomie 30h. Bluetooth 5.0 Micro intégré")
    );
    assert_eq!(
        product.image_sources,
        vec![
            "/wp-content/uploads/casque-1.jpg".to_string(),
            "/wp-content/uploads/casque-2.jpg".to_string(),
        ]
    );
}

#[test]
fn missing_markup_yields_empty_fields() {
    let product = extract_product("<html><body><p>Nothing here</p></body></html>");

    assert_eq!(product.name, DEFAULT_ITEM_NAME);
    assert!(product.price_before.is_none());
    assert!(product.price_after.is_none());
    assert!(product.discount.is_none());
    assert!(product.category.is_none());
    assert!(product.sub_category.is_none());
    assert!(product.description.is_none());
    assert!(product.image_sources.is_empty());
}

#[test]
fn regular_price_used_without_sale() {
    let html = r#"<h1>Clavier</h1><p class="price"><span><bdi>9 000 FCFA</bdi></span></p>"#;
    let product = extract_product(html);

    assert!(product.price_before.is_none());
    assert_eq!(product.price_after.as_deref(), Some("9 000 FCFA"));
}

#[test]
fn generic_breadcrumb_is_not_a_sub_category() {
    for label in ["Home", "SHOP", "boutique", "Accueil"] {
        let html = format!(
            r#"<nav class="woocommerce-breadcrumb"><a href="/">Start</a><a href="/x/">{label}</a></nav>"#
        );
        assert!(
            extract_product(&html).sub_category.is_none(),
            "{label} should be filtered"
        );
    }
}

#[test]
fn empty_name_falls_back_to_default() {
    let product = extract_product("<h1>   </h1>");
    assert_eq!(product.name, DEFAULT_ITEM_NAME);
}

#[test]
fn listing_links_keep_first_seen_order() {
    let html = r#"
        <ul class="products">
            <li><a class="woocommerce-LoopProduct-link" href="https://shop.example/produit/b/">B</a></li>
            <li><a class="woocommerce-LoopProduct-link" href="/produit/a/">A</a></li>
            <li><a class="woocommerce-LoopProduct-link" href="https://shop.example/produit/b/">B again</a></li>
            <li><a class="add_to_cart_button" href="/?add-to-cart=12">Add</a></li>
            <li><a class="woocommerce-LoopProduct-link" href="">Empty</a></li>
            <li><a class="woocommerce-LoopProduct-link" href="/produit/c/">C</a></li>
        </ul>
    "#;
    let page_url = Url::parse("https://shop.example/boutique/page/1/").expect("valid url");

    let links = extract_item_links(html, &page_url);
    assert_eq!(
        links,
        vec![
            "https://shop.example/produit/b/".to_string(),
            "https://shop.example/produit/a/".to_string(),
            "https://shop.example/produit/c/".to_string(),
        ]
    );
}

#[test]
fn listing_without_products_has_no_links() {
    let page_url = Url::parse("https://shop.example/boutique/page/9/").expect("valid url");
    assert!(extract_item_links("<p>Aucun produit</p>", &page_url).is_empty());
}
