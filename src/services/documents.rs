//! Invoice and receipt rendering.
//!
//! Documents are a best-effort side channel: callers attach them to a chat
//! when rendering succeeds and log when it does not, never failing the
//! order or payment that triggered them. Built-in Helvetica only encodes
//! WinAnsi, so amounts are labelled with the ISO currency code rather than
//! the naira glyph.

use crate::{errors::ServiceError, services::orders::OrderWithItems};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use tracing::instrument;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 7.0;

/// Customer block printed on invoices and receipts
#[derive(Debug, Clone)]
pub struct CustomerDetails {
    pub name: String,
    pub phone_number: String,
    pub address: String,
}

#[derive(Clone, Default)]
pub struct DocumentService;

impl DocumentService {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, order, customer), fields(order_id = %order.order.id))]
    pub fn render_invoice(
        &self,
        order: &OrderWithItems,
        customer: &CustomerDetails,
    ) -> Result<Vec<u8>, ServiceError> {
        self.render_document("INVOICE", order, customer, false)
    }

    #[instrument(skip(self, order, customer), fields(order_id = %order.order.id))]
    pub fn render_receipt(
        &self,
        order: &OrderWithItems,
        customer: &CustomerDetails,
    ) -> Result<Vec<u8>, ServiceError> {
        self.render_document("RECEIPT", order, customer, true)
    }

    fn render_document(
        &self,
        title: &str,
        order: &OrderWithItems,
        customer: &CustomerDetails,
        paid: bool,
    ) -> Result<Vec<u8>, ServiceError> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Layer 1",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ServiceError::InternalError(format!("pdf font: {}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ServiceError::InternalError(format!("pdf font: {}", e)))?;
        let canvas = doc.get_page(page).get_layer(layer);

        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
        let line = |text: &str, size: f32, use_bold: bool, y: &mut f32| {
            let face = if use_bold { &bold } else { &font };
            canvas.use_text(text, size, Mm(MARGIN_MM), Mm(*y), face);
            *y -= LINE_HEIGHT_MM;
        };

        line("HappyWoman Commerce", 16.0, true, &mut y);
        line(title, 13.0, true, &mut y);
        y -= LINE_HEIGHT_MM / 2.0;

        line(&format!("Order ID: {}", order.order.id), 10.0, false, &mut y);
        line(
            &format!("Date: {}", order.order.created_at.format("%Y-%m-%d %H:%M UTC")),
            10.0,
            false,
            &mut y,
        );
        line(
            &format!(
                "Payment status: {}",
                if paid { "PAID" } else { "PENDING" }
            ),
            10.0,
            false,
            &mut y,
        );
        y -= LINE_HEIGHT_MM / 2.0;

        line(&format!("Billed to: {}", customer.name), 10.0, false, &mut y);
        line(
            &format!("Phone: {}", customer.phone_number),
            10.0,
            false,
            &mut y,
        );
        if !customer.address.is_empty() {
            line(
                &format!("Delivery address: {}", customer.address),
                10.0,
                false,
                &mut y,
            );
        }
        y -= LINE_HEIGHT_MM / 2.0;

        line("Items", 11.0, true, &mut y);
        for item in &order.items {
            line(
                &format!(
                    "{} x{} @ NGN {:.2} = NGN {:.2}",
                    item.product_name, item.quantity, item.unit_price, item.subtotal
                ),
                10.0,
                false,
                &mut y,
            );
        }
        y -= LINE_HEIGHT_MM / 2.0;

        line(
            &format!("Total: NGN {:.2}", order.order.total_amount),
            12.0,
            true,
            &mut y,
        );

        doc.save_to_bytes()
            .map_err(|e| ServiceError::InternalError(format!("pdf render: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        order::{self, OrderStatus, PaymentStatus},
        order_item,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_order() -> OrderWithItems {
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        OrderWithItems {
            order: order::Model {
                id: order_id,
                user_id: Uuid::new_v4(),
                total_amount: dec!(1700.00),
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                delivery_address: "14 Allen Avenue, Ikeja, Lagos".into(),
                payment_link: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![order_item::Model {
                id: Uuid::new_v4(),
                order_id,
                product_retailer_id: "sku-1".into(),
                product_name: "Bag of Rice".into(),
                unit_price: dec!(850.00),
                quantity: 2,
                subtotal: dec!(1700.00),
                created_at: now,
            }],
        }
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Acme Foods".into(),
            phone_number: "2348012345678".into(),
            address: "14 Allen Avenue, Ikeja, Lagos".into(),
        }
    }

    #[test]
    fn invoice_renders_to_pdf_bytes() {
        let bytes = DocumentService::new()
            .render_invoice(&sample_order(), &customer())
            .expect("invoice should render");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn receipt_renders_to_pdf_bytes() {
        let bytes = DocumentService::new()
            .render_receipt(&sample_order(), &customer())
            .expect("receipt should render");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
